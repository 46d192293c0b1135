//! A small typed client for the Google Earth Engine REST API.
//!
//! Earth Engine evaluates lazily built expression graphs on its own backend. This module builds
//! those graphs ([expr]), wraps them in typed objects mirroring the Earth Engine object model
//! ([image], [collection], [primitives]) and ships them to the `value:compute` endpoint
//! ([client]) using credentials from [auth].

/// Declare a typed Earth Engine object wrapping an [expr::Expr].
macro_rules! ee_object {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name(pub(crate) $crate::earthengine::expr::Expr);

        impl $name {
            /// Return the underlying expression.
            pub fn expr(&self) -> &$crate::earthengine::expr::Expr {
                &self.0
            }
        }

        impl From<$crate::earthengine::expr::Expr> for $name {
            fn from(expr: $crate::earthengine::expr::Expr) -> Self {
                Self(expr)
            }
        }

        impl From<$name> for $crate::earthengine::expr::Expr {
            fn from(object: $name) -> Self {
                object.0
            }
        }
    };
}

pub mod auth;
pub mod client;
pub mod collection;
pub mod expr;
pub mod image;
pub mod primitives;

pub use client::{ComputeBackend, EarthEngineClient};
pub use collection::{FeatureCollection, ImageCollection};
pub use expr::{Expr, Expression};
pub use image::Image;
pub use primitives::{Date, Dictionary, Filter, Geometry, Reducer};

//! Images and image arithmetic.

use crate::earthengine::expr::Expr;
use crate::earthengine::primitives::{Dictionary, Geometry, Reducer};

use serde_json::json;

ee_object!(
    /// A lazily evaluated multi-band raster.
    ///
    /// Arithmetic operators map onto the per-pixel `Image.add`, `Image.subtract`,
    /// `Image.multiply` and `Image.divide` algorithms. Numbers are promoted to constant images.
    Image
);

impl Image {
    /// Load an image asset.
    pub fn load(id: &str) -> Self {
        Image(Expr::invoke("Image.load", [("id", Expr::constant(id))]))
    }

    /// A single-band image with the same value everywhere.
    pub fn constant(value: f64) -> Self {
        Image(Expr::invoke(
            "Image.constant",
            [("value", Expr::constant(value))],
        ))
    }

    /// A multi-band constant image, one band per value.
    pub fn constant_bands(values: &[f64]) -> Self {
        Image(Expr::invoke(
            "Image.constant",
            [("value", Expr::constant(json!(values)))],
        ))
    }

    /// A two-band image holding the `longitude` and `latitude` of each pixel.
    pub fn pixel_lon_lat() -> Self {
        Image(Expr::call("Image.pixelLonLat"))
    }

    /// Select bands by name or regular expression.
    pub fn select(&self, bands: &[&str]) -> Self {
        Image(Expr::invoke(
            "Image.select",
            [
                ("input", self.0.clone()),
                ("bandSelectors", Expr::constant(json!(bands))),
            ],
        ))
    }

    /// Select bands and rename them.
    pub fn select_as(&self, bands: &[&str], names: &[&str]) -> Self {
        Image(Expr::invoke(
            "Image.select",
            [
                ("input", self.0.clone()),
                ("bandSelectors", Expr::constant(json!(bands))),
                ("newNames", Expr::constant(json!(names))),
            ],
        ))
    }

    pub fn rename(&self, names: &[&str]) -> Self {
        Image(Expr::invoke(
            "Image.rename",
            [
                ("input", self.0.clone()),
                ("names", Expr::constant(json!(names))),
            ],
        ))
    }

    /// Add the bands of `source`, replacing bands with the same name when `overwrite` is set.
    pub fn add_bands(&self, source: &Image, overwrite: bool) -> Self {
        Image(Expr::invoke(
            "Image.addBands",
            [
                ("dstImg", self.0.clone()),
                ("srcImg", source.0.clone()),
                ("overwrite", Expr::constant(overwrite)),
            ],
        ))
    }

    pub fn to_float(&self) -> Self {
        Image(Expr::invoke("Image.toFloat", [("value", self.0.clone())]))
    }

    pub fn sqrt(&self) -> Self {
        Image(Expr::invoke("Image.sqrt", [("value", self.0.clone())]))
    }

    pub fn right_shift(&self, bits: u32) -> Self {
        self.binary("Image.rightShift", Image::constant(f64::from(bits)))
    }

    pub fn bitwise_and(&self, mask: u32) -> Self {
        self.binary("Image.bitwiseAnd", Image::constant(f64::from(mask)))
    }

    /// 1 where the pixel equals `value`, 0 elsewhere.
    pub fn equals(&self, value: f64) -> Self {
        self.binary("Image.eq", Image::constant(value))
    }

    /// 1 where the pixel differs from `value`, 0 elsewhere.
    pub fn not_equals(&self, value: f64) -> Self {
        self.binary("Image.neq", Image::constant(value))
    }

    /// Logical AND of two images.
    pub fn and(&self, other: &Image) -> Self {
        self.binary("Image.and", other.clone())
    }

    /// Mask out pixels where `mask` is zero, keeping any existing mask.
    pub fn update_mask(&self, mask: &Image) -> Self {
        Image(Expr::invoke(
            "Image.updateMask",
            [("image", self.0.clone()), ("mask", mask.0.clone())],
        ))
    }

    /// Replace masked pixels with 0.
    pub fn unmask(&self) -> Self {
        Image(Expr::invoke("Image.unmask", [("input", self.0.clone())]))
    }

    pub fn clip(&self, geometry: &Geometry) -> Self {
        Image(Expr::invoke(
            "Image.clip",
            [("input", self.0.clone()), ("geometry", geometry.expr().clone())],
        ))
    }

    /// Set a metadata property.
    pub fn set(&self, key: &str, value: Expr) -> Self {
        Image(Expr::invoke(
            "Element.set",
            [
                ("object", self.0.clone()),
                ("key", Expr::constant(key)),
                ("value", value),
            ],
        ))
    }

    /// Copy all metadata properties of `source`.
    pub fn copy_properties(&self, source: &Image) -> Self {
        Image(Expr::invoke(
            "Element.copyProperties",
            [("destination", self.0.clone()), ("source", source.0.clone())],
        ))
    }

    /// Apply `reducer` to all pixels within `geometry`, sampled at `scale` metres.
    pub fn reduce_region(
        &self,
        reducer: &Reducer,
        geometry: &Geometry,
        scale: f64,
        max_pixels: f64,
    ) -> Dictionary {
        Dictionary::from(Expr::invoke(
            "Image.reduceRegion",
            [
                ("image", self.0.clone()),
                ("reducer", reducer.expr().clone()),
                ("geometry", geometry.expr().clone()),
                ("scale", Expr::constant(scale)),
                ("maxPixels", Expr::constant(max_pixels)),
            ],
        ))
    }

    fn binary(&self, algorithm: &str, other: Image) -> Self {
        Image(Expr::invoke(
            algorithm,
            [("image1", self.0.clone()), ("image2", other.0)],
        ))
    }
}

macro_rules! image_operator {
    ($op:ident, $method:ident, $algorithm:literal) => {
        impl std::ops::$op for Image {
            type Output = Image;

            fn $method(self, rhs: Image) -> Image {
                self.binary($algorithm, rhs)
            }
        }

        impl std::ops::$op<f64> for Image {
            type Output = Image;

            fn $method(self, rhs: f64) -> Image {
                self.binary($algorithm, Image::constant(rhs))
            }
        }
    };
}

image_operator!(Add, add, "Image.add");
image_operator!(Sub, sub, "Image.subtract");
image_operator!(Mul, mul, "Image.multiply");
image_operator!(Div, div, "Image.divide");

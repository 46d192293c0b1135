//! This crate provides a vegetation anomaly server for the provinces (aimags) and districts
//! (soums) of Mongolia. For a district, a vegetation index and a year it reports how far each
//! pixel's growing season value departs from the multi-year baseline, expressed as a z-score.
//!
//! All of the raster work happens in Google Earth Engine. The server assembles Landsat
//! collections, seasonal composites and the anomaly as an Earth Engine expression graph, sends it
//! to the REST `value:compute` endpoint and turns the sampled result into GeoJSON for a web map.
//!
//! The server is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request data and expression graphs.
//! * [reqwest] talks to the Earth Engine API and the GCE metadata server.
//! * [geojson] models the response.

pub mod anomaly;
pub mod app;
pub mod app_state;
pub mod cache;
pub mod cli;
pub mod composite;
pub mod earthengine;
pub mod error;
pub mod geojson_output;
pub mod indices;
pub mod landsat;
pub mod metrics;
pub mod models;
pub mod server;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_json;

//! Conversion of sampled anomaly pixels to GeoJSON.

use crate::error::AnomalyError;

use geojson::{Feature, FeatureCollection, JsonObject};
use serde::Deserialize;
use serde_json::Value;

/// Pixel centres and anomaly values as returned by a `Reducer.toList` region reduction.
#[derive(Debug, Deserialize, PartialEq)]
pub struct PixelSamples {
    pub longitude: Vec<f64>,
    pub latitude: Vec<f64>,
    pub z_score: Vec<Option<f64>>,
}

impl PixelSamples {
    /// One `Point` feature per pixel, with the anomaly as its `z_score` property.
    pub fn into_feature_collection(self) -> Result<FeatureCollection, AnomalyError> {
        if self.longitude.len() != self.latitude.len() || self.longitude.len() != self.z_score.len()
        {
            return Err(AnomalyError::SampleLengthMismatch {
                longitude: self.longitude.len(),
                latitude: self.latitude.len(),
                values: self.z_score.len(),
            });
        }
        let features = self
            .longitude
            .into_iter()
            .zip(self.latitude)
            .zip(self.z_score)
            .map(|((longitude, latitude), z_score)| {
                let mut properties = JsonObject::new();
                properties.insert("z_score".to_string(), Value::from(z_score));
                Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                        longitude, latitude,
                    ]))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();
        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }
}

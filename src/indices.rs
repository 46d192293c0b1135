//! Vegetation index band arithmetic.
//!
//! Every formula is written once, generic over [BandValue]. Evaluated on `f64` it computes a
//! single pixel; evaluated on [Image] it builds the equivalent per-pixel Earth Engine graph.

use crate::earthengine::Image;

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};
use strum_macros::Display;

/// A value that band arithmetic can be performed on.
pub trait BandValue:
    Clone
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    /// Square root.
    fn sqrt(&self) -> Self;
}

impl BandValue for f64 {
    fn sqrt(&self) -> Self {
        f64::sqrt(*self)
    }
}

impl BandValue for Image {
    fn sqrt(&self) -> Self {
        Image::sqrt(self)
    }
}

/// Coefficients of the Enhanced Vegetation Index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EviCoefficients {
    pub g: f64,
    pub c1: f64,
    pub c2: f64,
    pub l: f64,
}

impl Default for EviCoefficients {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// Coefficients of the Soil Adjusted Vegetation Index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaviCoefficients {
    pub l: f64,
    pub g: f64,
}

impl Default for SaviCoefficients {
    fn default() -> Self {
        Self { l: 0.5, g: 1.5 }
    }
}

/// Coefficients of the Modified Soil Adjusted Vegetation Index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MsaviCoefficients {
    pub g: f64,
    pub h: f64,
    pub l: f64,
}

impl Default for MsaviCoefficients {
    fn default() -> Self {
        Self {
            g: 2.0,
            h: 8.0,
            l: 1.0,
        }
    }
}

/// `(NIR - RED) / (NIR + RED)`
pub fn ndvi<T: BandValue>(nir: &T, red: &T) -> T {
    (nir.clone() - red.clone()) / (nir.clone() + red.clone())
}

/// `G * ((NIR - RED) / (NIR + C1 * RED - C2 * BLUE + L))`
pub fn evi<T: BandValue>(nir: &T, red: &T, blue: &T, c: &EviCoefficients) -> T {
    (nir.clone() - red.clone()) / (nir.clone() + red.clone() * c.c1 - blue.clone() * c.c2 + c.l)
        * c.g
}

/// `((NIR - RED) / (NIR + RED + L)) * G`
pub fn savi<T: BandValue>(nir: &T, red: &T, c: &SaviCoefficients) -> T {
    (nir.clone() - red.clone()) / (nir.clone() + red.clone() + c.l) * c.g
}

/// `(G * NIR + L - sqrt((G * NIR + L)^2 - H * (NIR - RED))) / 2`
pub fn msavi<T: BandValue>(nir: &T, red: &T, c: &MsaviCoefficients) -> T {
    let a = nir.clone() * c.g + c.l;
    let radicand = a.clone() * a.clone() - (nir.clone() - red.clone()) * c.h;
    (a - radicand.sqrt()) / 2.0
}

/// `(NIR - SWIR) / (NIR + SWIR)`
pub fn ndwi<T: BandValue>(nir: &T, swir: &T) -> T {
    (nir.clone() - swir.clone()) / (nir.clone() + swir.clone())
}

/// `NIR * NDVI`
pub fn nirv<T: BandValue>(nir: &T, red: &T) -> T {
    nir.clone() * ndvi(nir, red)
}

/// Standardised deviation of `value` from a baseline.
pub fn zscore<T: BandValue>(value: &T, mean: &T, std_dev: &T) -> T {
    (value.clone() - mean.clone()) / std_dev.clone()
}

/// Linear rescaling `band * slope + intercept`.
///
/// The slope and intercept may be scalars, or for images, constant images with one band per
/// input band.
pub fn harmonize<T, C>(band: T, slope: C, intercept: C) -> T
where
    T: Mul<C, Output = T> + Add<C, Output = T>,
{
    band * slope + intercept
}

/// Surface reflectance bands used by the indices.
#[derive(Clone, Debug)]
pub struct Reflectance<T> {
    pub blue: T,
    pub red: T,
    pub nir: T,
    pub swir: T,
}

/// Vegetation index selectable by clients.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum VegetationIndex {
    Ndvi,
    Evi,
    /// Served from the MSAVI band.
    Savi,
    Msavi,
    Ndwi,
    #[serde(alias = "NIRv")]
    Nirv,
}

impl VegetationIndex {
    /// Indices computed for every scene and carried into the composites.
    pub const COMPOSITE_BANDS: [VegetationIndex; 5] = [
        VegetationIndex::Ndvi,
        VegetationIndex::Msavi,
        VegetationIndex::Evi,
        VegetationIndex::Nirv,
        VegetationIndex::Ndwi,
    ];

    /// Name of the composite band holding this index.
    pub fn band_name(self) -> &'static str {
        match self {
            VegetationIndex::Ndvi => "ndvi",
            VegetationIndex::Evi => "evi",
            VegetationIndex::Savi | VegetationIndex::Msavi => "msavi",
            VegetationIndex::Ndwi => "ndwi",
            VegetationIndex::Nirv => "nirv",
        }
    }

    /// Evaluate the index with default coefficients.
    pub fn compute<T: BandValue>(self, bands: &Reflectance<T>) -> T {
        match self {
            VegetationIndex::Ndvi => ndvi(&bands.nir, &bands.red),
            VegetationIndex::Evi => evi(
                &bands.nir,
                &bands.red,
                &bands.blue,
                &EviCoefficients::default(),
            ),
            VegetationIndex::Savi => savi(&bands.nir, &bands.red, &SaviCoefficients::default()),
            VegetationIndex::Msavi => {
                msavi(&bands.nir, &bands.red, &MsaviCoefficients::default())
            }
            VegetationIndex::Ndwi => ndwi(&bands.nir, &bands.swir),
            VegetationIndex::Nirv => nirv(&bands.nir, &bands.red),
        }
    }
}

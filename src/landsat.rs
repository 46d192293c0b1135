//! Cloud-free Landsat Collection 2 surface reflectance with vegetation index bands.
//!
//! Scenes of all selected sensors are brought onto the Landsat 8 OLI band layout and
//! calibration, cloud masked using the `QA_PIXEL` band, and reduced to the index bands in
//! [VegetationIndex::COMPOSITE_BANDS].

use crate::earthengine::{Date, Filter, Geometry, Image, ImageCollection};
use crate::indices::{self, Reflectance, VegetationIndex};

use clap::ValueEnum;
use strum_macros::Display;

/// OLI bands and the TM/ETM+ names they are renamed to.
const OLI_BANDS: [&str; 8] = [
    "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B6", "SR_B7", "ST_B10", "QA_PIXEL",
];
const OLI_RENAMED: [&str; 8] = [
    "SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B7", "ST_B10", "QA_PIXEL",
];

/// Reflective bands adjusted by harmonization.
const HARMONIZED_BANDS: [&str; 6] = ["SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B7"];

const BLUE: &str = "SR_B1";
const RED: &str = "SR_B3";
const NIR: &str = "SR_B4";
const SWIR: &str = "SR_B5";

const QA_BAND: &str = "QA_PIXEL";

/// Landsat sensor.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, ValueEnum)]
pub enum Sensor {
    /// Landsat 8 OLI
    #[value(name = "LC08")]
    #[strum(serialize = "LC08")]
    Lc08,
    /// Landsat 7 ETM+
    #[value(name = "LE07")]
    #[strum(serialize = "LE07")]
    Le07,
    /// Landsat 5 TM
    #[value(name = "LT05")]
    #[strum(serialize = "LT05")]
    Lt05,
}

impl Sensor {
    /// Collection 2 Tier 1 Level 2 collection id.
    pub fn collection_id(self) -> &'static str {
        match self {
            Sensor::Lc08 => "LANDSAT/LC08/C02/T1_L2",
            Sensor::Le07 => "LANDSAT/LE07/C02/T1_L2",
            Sensor::Lt05 => "LANDSAT/LT05/C02/T1_L2",
        }
    }

    /// Coefficients converting this sensor's reflectance to OLI.
    pub fn harmonization(self) -> Option<&'static Harmonization> {
        match self {
            Sensor::Lc08 => None,
            Sensor::Le07 => Some(&ETM_PLUS_TO_OLI),
            Sensor::Lt05 => Some(&TM_TO_OLI),
        }
    }
}

/// Per-band linear transformation of [HARMONIZED_BANDS].
#[derive(Debug, PartialEq)]
pub struct Harmonization {
    pub slopes: [f64; 6],
    pub intercepts: [f64; 6],
}

/// Roy et al. (2016), ETM+ to OLI.
pub const ETM_PLUS_TO_OLI: Harmonization = Harmonization {
    slopes: [0.8474, 0.8483, 0.9047, 0.8462, 0.8937, 0.9071],
    intercepts: [0.0003, 0.0088, 0.0061, 0.0412, 0.0254, 0.0172],
};

/// Roy et al. (2016), TM to OLI.
pub const TM_TO_OLI: Harmonization = Harmonization {
    slopes: [0.9785, 0.9542, 0.9825, 1.0073, 1.0171, 0.9949],
    intercepts: [-0.0095, -0.0016, -0.0022, -0.0021, -0.0030, 0.0029],
};

/// `QA_PIXEL` flags that mask a pixel when set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QaBit {
    DilutedCloud = 1,
    Cirrus = 2,
    Cloud = 3,
    CloudShadow = 4,
}

impl QaBit {
    pub const ALL: [QaBit; 4] = [
        QaBit::DilutedCloud,
        QaBit::Cirrus,
        QaBit::Cloud,
        QaBit::CloudShadow,
    ];
}

/// Collection options.
#[derive(Clone, Debug, PartialEq)]
pub struct LandsatSettings {
    /// Sensors to merge, in order.
    pub sensors: Vec<Sensor>,
    /// Whether to harmonize TM and ETM+ to OLI.
    pub harmonize: bool,
    /// Keep only scenes with `CLOUD_COVER` below this percentage.
    pub max_cloud_cover: Option<f64>,
    pub cloud_mask: Vec<QaBit>,
}

impl Default for LandsatSettings {
    fn default() -> Self {
        Self {
            sensors: vec![Sensor::Lc08, Sensor::Le07, Sensor::Lt05],
            harmonize: true,
            max_cloud_cover: None,
            cloud_mask: QaBit::ALL.to_vec(),
        }
    }
}

/// Convert digital numbers to reflectance and brightness temperature.
pub fn apply_scale_factors(image: &Image) -> Image {
    let optical = (image.select(&["SR_B."]) * 0.0000275 - 0.2).to_float();
    let thermal = (image.select(&["ST_B.*"]) * 0.00341802 + 149.0).to_float();
    image.add_bands(&optical, true).add_bands(&thermal, true)
}

/// Rescale the reflective bands of `image` using `coefficients`.
pub fn harmonize(image: &Image, coefficients: &Harmonization) -> Image {
    let bands = indices::harmonize(
        image.select(&HARMONIZED_BANDS),
        Image::constant_bands(&coefficients.slopes),
        Image::constant_bands(&coefficients.intercepts),
    );
    image.add_bands(&bands, true)
}

/// Mask pixels with any of `bits` set in `QA_PIXEL`.
pub fn cloud_mask(image: &Image, bits: &[QaBit]) -> Image {
    let qa = image.select(&[QA_BAND]);
    let clear = bits
        .iter()
        .map(|bit| qa.right_shift(*bit as u32).bitwise_and(1).equals(0.0))
        .reduce(|mask, other| mask.and(&other));
    match clear {
        Some(mask) => image.update_mask(&mask),
        None => image.clone(),
    }
}

/// Append the composite index bands to `image`.
pub fn add_index_bands(image: &Image) -> Image {
    let bands = Reflectance {
        blue: image.select(&[BLUE]),
        red: image.select(&[RED]),
        nir: image.select(&[NIR]),
        swir: image.select(&[SWIR]),
    };
    VegetationIndex::COMPOSITE_BANDS
        .iter()
        .fold(image.clone(), |image, index| {
            image.add_bands(&index.compute(&bands).rename(&[index.band_name()]), false)
        })
}

/// Scaled (and optionally harmonized) scenes of one sensor.
fn sensor_collection(sensor: Sensor, harmonization: bool) -> ImageCollection {
    let collection = ImageCollection::load(sensor.collection_id());
    let collection = match sensor {
        Sensor::Lc08 => collection.select_as(&OLI_BANDS, &OLI_RENAMED),
        Sensor::Le07 | Sensor::Lt05 => collection,
    };
    match sensor.harmonization().filter(|_| harmonization) {
        Some(coefficients) => {
            collection.map(|image| harmonize(&apply_scale_factors(&image), coefficients))
        }
        None => collection.map(|image| apply_scale_factors(&image)),
    }
}

/// Cloud-masked index bands of all scenes intersecting `region` acquired between `start` and
/// `end` inclusive.
pub fn landsat_collection(
    settings: &LandsatSettings,
    region: &Geometry,
    start: time::Date,
    end: time::Date,
) -> ImageCollection {
    let merged = settings
        .sensors
        .iter()
        .map(|sensor| sensor_collection(*sensor, settings.harmonize))
        .reduce(|merged, other| merged.merge(&other))
        .unwrap_or_else(|| ImageCollection::from_images([]));

    let end = end.next_day().unwrap_or(end);
    let mut collection = merged
        .filter_bounds(region)
        .filter_date(&Date::new(start), &Date::new(end));
    if let Some(max_cloud_cover) = settings.max_cloud_cover {
        collection = collection.filter(&Filter::less_than("CLOUD_COVER", max_cloud_cover));
    }
    let band_names: Vec<&str> = VegetationIndex::COMPOSITE_BANDS
        .iter()
        .map(|index| index.band_name())
        .collect();
    collection.map(|image| {
        add_index_bands(&cloud_mask(&image, &settings.cloud_mask)).select(&band_names)
    })
}

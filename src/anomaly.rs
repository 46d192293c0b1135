//! Vegetation index anomaly maps and time series for a province and district.
//!
//! The whole computation is a single expression graph: Landsat scenes of the baseline period are
//! composited per year, the composite of the requested year is compared with the baseline mean
//! and standard deviation, and the resulting z-score is sampled on a regular grid. Only the
//! sampled lists travel back.

use crate::cli::CommandLineArgs;
use crate::composite::{self, GrazingMask, Season, YearlyComposite};
use crate::earthengine::{
    ComputeBackend, Expr, Expression, FeatureCollection, Filter, Geometry, Image,
    ImageCollection, Reducer,
};
use crate::error::AnomalyError;
use crate::geojson_output::PixelSamples;
use crate::indices::{self, VegetationIndex};
use crate::landsat::{self, LandsatSettings, QaBit};
use crate::models::{RequestData, TimeSeriesRequest, YearlyMean};

use std::ops::RangeInclusive;
use time::macros::date;

/// Name of the anomaly band.
pub const Z_SCORE_BAND: &str = "z_score";

/// Boundary table properties holding province and district names.
const PROVINCE_PROPERTY: &str = "aimag_eng";
const DISTRICT_PROPERTY: &str = "soum_eng";

/// Everything needed to build anomaly graphs, independent of the request.
#[derive(Clone, Debug, PartialEq)]
pub struct Pipeline {
    pub boundaries_asset: String,
    pub landsat: LandsatSettings,
    pub season: Season,
    pub baseline_start: time::Date,
    pub baseline_end: time::Date,
    pub grazing_mask: GrazingMask,
    pub scale: f64,
    pub max_pixels: f64,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            boundaries_asset: "users/ta346/mng-bounds/soum_aimag".to_string(),
            landsat: LandsatSettings::default(),
            season: Season::default(),
            baseline_start: date!(2017 - 01 - 01),
            baseline_end: date!(2023 - 12 - 31),
            grazing_mask: GrazingMask::new("users/ta346/pasture_delineation/pas_raster_new", &[3]),
            scale: 1000.0,
            max_pixels: 1e13,
        }
    }
}

impl Pipeline {
    /// Create a pipeline configured by `args`.
    pub fn new(args: &CommandLineArgs) -> Result<Self, AnomalyError> {
        if args.baseline_start > args.baseline_end {
            return Err(AnomalyError::InvalidBaseline {
                start: args.baseline_start,
                end: args.baseline_end,
            });
        }
        Ok(Self {
            boundaries_asset: args.boundaries_asset.clone(),
            landsat: LandsatSettings {
                sensors: args.sensors.clone(),
                harmonize: args.harmonize,
                max_cloud_cover: args.max_cloud_cover,
                cloud_mask: QaBit::ALL.to_vec(),
            },
            season: Season::new(args.season_start_month, args.season_end_month)?,
            baseline_start: args.baseline_start,
            baseline_end: args.baseline_end,
            grazing_mask: GrazingMask::new(&args.pasture_asset, &args.pasture_excluded_classes),
            scale: args.scale,
            max_pixels: args.max_pixels,
        })
    }

    /// Years with a composite.
    pub fn baseline_years(&self) -> RangeInclusive<i32> {
        self.baseline_start.year()..=self.baseline_end.year()
    }

    /// Union of the boundaries of `district` in `province`.
    pub fn region(&self, province: &str, district: &str) -> Geometry {
        FeatureCollection::load(&self.boundaries_asset)
            .filter(&Filter::and([
                Filter::equals(PROVINCE_PROPERTY, province),
                Filter::equals(DISTRICT_PROPERTY, district),
            ]))
            .geometry()
    }

    /// Single-band yearly composites of `index` over the baseline.
    pub fn composites(
        &self,
        index: VegetationIndex,
        grazing_only: bool,
        region: &Geometry,
    ) -> Result<Vec<YearlyComposite>, AnomalyError> {
        let collection = landsat::landsat_collection(
            &self.landsat,
            region,
            self.baseline_start,
            self.baseline_end,
        );
        let composites =
            composite::yearly_composites(&collection, self.baseline_years(), &self.season, region)?;
        Ok(composites
            .into_iter()
            .map(|YearlyComposite { year, image }| {
                let image = image.select(&[index.band_name()]);
                let image = if grazing_only {
                    self.grazing_mask.apply(&image)
                } else {
                    image
                };
                YearlyComposite { year, image }
            })
            .collect())
    }

    /// Z-score of the requested year against the baseline, clipped to `region`.
    pub fn anomaly(&self, request: &RequestData, region: &Geometry) -> Result<Image, AnomalyError> {
        let composites = self.composites(
            request.selected_vegetation_index,
            request.grazing_only,
            region,
        )?;
        let selected = composites
            .iter()
            .find(|composite| composite.year == request.selected_year)
            .map(|composite| composite.image.clone())
            .ok_or_else(|| {
                let years = self.baseline_years();
                AnomalyError::YearOutOfRange {
                    year: request.selected_year,
                    first: *years.start(),
                    last: *years.end(),
                }
            })?;
        let baseline =
            ImageCollection::from_images(composites.into_iter().map(|composite| composite.image));
        let mean = baseline.mean();
        let std_dev = baseline.reduce(&Reducer::std_dev());
        Ok(indices::zscore(&selected, &mean, &std_dev)
            .clip(region)
            .rename(&[Z_SCORE_BAND])
            .copy_properties(&selected))
    }

    /// Graph sampling the anomaly map of `request` into coordinate and value lists.
    pub fn samples_expression(&self, request: &RequestData) -> Result<Expression, AnomalyError> {
        let region = self.region(&request.selected_province, &request.selected_soum);
        let anomaly = self.anomaly(request, &region)?;
        let samples = Image::pixel_lon_lat()
            .add_bands(&anomaly, false)
            .unmask()
            .reduce_region(&Reducer::to_list(), &region, self.scale, self.max_pixels);
        Ok(Expression::from_root(samples.expr()))
    }

    /// Graph computing the regional mean of each yearly composite, in year order.
    pub fn time_series_expression(
        &self,
        request: &TimeSeriesRequest,
    ) -> Result<Expression, AnomalyError> {
        let region = self.region(&request.selected_province, &request.selected_soum);
        let index = request.selected_vegetation_index;
        let means = self
            .composites(index, request.grazing_only, &region)?
            .into_iter()
            .map(|composite| {
                composite
                    .image
                    .reduce_region(&Reducer::mean(), &region, self.scale, self.max_pixels)
                    .get(index.band_name())
            });
        Ok(Expression::from_root(&Expr::array(means)))
    }
}

/// Compute the anomaly map of `request` as GeoJSON points.
#[tracing::instrument(level = "DEBUG", skip(backend, pipeline))]
pub async fn fetch_anomaly_map(
    backend: &dyn ComputeBackend,
    pipeline: &Pipeline,
    request: &RequestData,
) -> Result<geojson::FeatureCollection, AnomalyError> {
    let expression = pipeline.samples_expression(request)?;
    let result = backend.compute(&expression).await?;
    let samples: PixelSamples = serde_json::from_value(result)?;
    tracing::debug!("sampled {} pixels", samples.z_score.len());
    samples.into_feature_collection()
}

/// Compute the yearly regional means of the index selected by `request`.
#[tracing::instrument(level = "DEBUG", skip(backend, pipeline))]
pub async fn fetch_time_series(
    backend: &dyn ComputeBackend,
    pipeline: &Pipeline,
    request: &TimeSeriesRequest,
) -> Result<Vec<YearlyMean>, AnomalyError> {
    let expression = pipeline.time_series_expression(request)?;
    let result = backend.compute(&expression).await?;
    let means: Vec<Option<f64>> = serde_json::from_value(result)?;
    let years = pipeline.baseline_years();
    let expected = years.clone().count();
    if means.len() != expected {
        return Err(AnomalyError::SeriesLengthMismatch {
            expected,
            actual: means.len(),
        });
    }
    Ok(years
        .zip(means)
        .map(|(year, mean)| YearlyMean { year, mean })
        .collect())
}

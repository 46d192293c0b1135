use crate::anomaly::Pipeline;
use crate::cache::ResultCache;
use crate::cli::CommandLineArgs;
use crate::earthengine::{ComputeBackend, EarthEngineClient};
use crate::error::AnomalyError;
use crate::models::{RequestData, TimeSeriesRequest, YearlyMean};

use std::sync::Arc;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Graph construction settings.
    pub pipeline: Pipeline,

    /// Evaluates graphs.
    pub backend: Arc<dyn ComputeBackend>,

    /// Finished anomaly maps.
    pub anomaly_cache: ResultCache<RequestData, geojson::FeatureCollection>,

    /// Finished time series.
    pub time_series_cache: ResultCache<TimeSeriesRequest, Vec<YearlyMean>>,
}

impl AppState {
    /// Create and return an [AppState] backed by Earth Engine.
    pub fn new(args: &CommandLineArgs) -> Result<Self, AnomalyError> {
        let backend = Arc::new(EarthEngineClient::new(args)?);
        Self::with_backend(args, backend)
    }

    /// Create and return an [AppState] using `backend` to evaluate graphs.
    pub fn with_backend(
        args: &CommandLineArgs,
        backend: Arc<dyn ComputeBackend>,
    ) -> Result<Self, AnomalyError> {
        Ok(Self {
            pipeline: Pipeline::new(args)?,
            backend,
            anomaly_cache: ResultCache::new("anomaly_map", args.cache_size, args.cache_ttl),
            time_series_cache: ResultCache::new("time_series", args.cache_size, args.cache_ttl),
        })
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;

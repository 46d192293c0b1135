//! Command Line Interface (CLI) arguments.

use crate::landsat::Sensor;

use clap::{ArgAction, Parser};
use time::macros::format_description;
use url::Url;

/// Parse a `YYYY-MM-DD` date.
fn parse_date(value: &str) -> Result<time::Date, time::error::Parse> {
    time::Date::parse(value, format_description!("[year]-[month]-[day]"))
}

/// Vegetation anomaly server command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "VEGANOMALY_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "VEGANOMALY_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "VEGANOMALY_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/vegetation-anomaly/certs/cert.pem",
        env = "VEGANOMALY_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/vegetation-anomaly/certs/key.pem",
        env = "VEGANOMALY_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for requests to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "VEGANOMALY_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Whether to enable sending traces to Jaeger.
    #[arg(long, default_value_t = false, env = "VEGANOMALY_ENABLE_JAEGER")]
    pub enable_jaeger: bool,

    /// Base URL of the Earth Engine REST API
    #[arg(
        long,
        default_value = "https://earthengine.googleapis.com/",
        env = "VEGANOMALY_EE_API_URL"
    )]
    pub ee_api_url: Url,
    /// Cloud project used for Earth Engine requests
    #[arg(long, default_value = "earthengine-legacy", env = "VEGANOMALY_EE_PROJECT")]
    pub ee_project: String,
    /// OAuth access token for Earth Engine. When unset, a token of the instance service account
    /// is requested from the metadata server.
    #[arg(long, env = "VEGANOMALY_EE_ACCESS_TOKEN", hide_env_values = true)]
    pub ee_access_token: Option<String>,
    /// Base URL of the compute metadata server
    #[arg(
        long,
        default_value = "http://metadata.google.internal/",
        env = "VEGANOMALY_METADATA_URL"
    )]
    pub metadata_url: Url,
    /// Timeout in seconds for Earth Engine requests
    #[arg(long, default_value_t = 300, env = "VEGANOMALY_EE_TIMEOUT")]
    pub ee_timeout: u64,

    /// Table asset with province and district boundaries
    #[arg(
        long,
        default_value = "users/ta346/mng-bounds/soum_aimag",
        env = "VEGANOMALY_BOUNDARIES_ASSET"
    )]
    pub boundaries_asset: String,
    /// Raster asset with land-use classes used by the grazing mask
    #[arg(
        long,
        default_value = "users/ta346/pasture_delineation/pas_raster_new",
        env = "VEGANOMALY_PASTURE_ASSET"
    )]
    pub pasture_asset: String,
    /// Land-use classes masked out of grazing-only maps
    #[arg(
        long,
        default_values_t = [3],
        value_delimiter = ',',
        env = "VEGANOMALY_PASTURE_EXCLUDED_CLASSES"
    )]
    pub pasture_excluded_classes: Vec<i64>,
    /// First day of the baseline period
    #[arg(
        long,
        default_value = "2017-01-01",
        value_parser = parse_date,
        env = "VEGANOMALY_BASELINE_START"
    )]
    pub baseline_start: time::Date,
    /// Last day of the baseline period
    #[arg(
        long,
        default_value = "2023-12-31",
        value_parser = parse_date,
        env = "VEGANOMALY_BASELINE_END"
    )]
    pub baseline_end: time::Date,
    /// First month of the composite season
    #[arg(
        long,
        default_value_t = 6,
        value_parser = clap::value_parser!(u8).range(1..=12),
        env = "VEGANOMALY_SEASON_START_MONTH"
    )]
    pub season_start_month: u8,
    /// Last month of the composite season
    #[arg(
        long,
        default_value_t = 8,
        value_parser = clap::value_parser!(u8).range(1..=12),
        env = "VEGANOMALY_SEASON_END_MONTH"
    )]
    pub season_end_month: u8,
    /// Landsat sensors to merge
    #[arg(
        long,
        value_enum,
        default_values_t = [Sensor::Lc08, Sensor::Le07, Sensor::Lt05],
        value_delimiter = ',',
        num_args = 1..,
        env = "VEGANOMALY_SENSORS"
    )]
    pub sensors: Vec<Sensor>,
    /// Whether to harmonize TM and ETM+ reflectance to OLI
    #[arg(long, action = ArgAction::Set, default_value_t = true, env = "VEGANOMALY_HARMONIZE")]
    pub harmonize: bool,
    /// Keep only scenes with less cloud cover than this percentage
    #[arg(long, env = "VEGANOMALY_MAX_CLOUD_COVER")]
    pub max_cloud_cover: Option<f64>,
    /// Sampling scale in metres
    #[arg(long, default_value_t = 1000.0, env = "VEGANOMALY_SCALE")]
    pub scale: f64,
    /// Maximum number of pixels per region reduction
    #[arg(long, default_value_t = 1e13, env = "VEGANOMALY_MAX_PIXELS")]
    pub max_pixels: f64,

    /// Number of results kept in each result cache. 0 disables caching.
    #[arg(long, default_value_t = 128, env = "VEGANOMALY_CACHE_SIZE")]
    pub cache_size: usize,
    /// Time in seconds a cached result stays valid
    #[arg(long, default_value_t = 3600, env = "VEGANOMALY_CACHE_TTL")]
    pub cache_ttl: u64,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}

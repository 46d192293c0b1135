//! This file defines the vegetation-anomaly binary entry point.

use vegetation_anomaly::app;
use vegetation_anomaly::cli;
use vegetation_anomaly::metrics;
use vegetation_anomaly::server;
use vegetation_anomaly::tracing;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing(&args);
    metrics::register_metrics();
    let service = match app::service(&args) {
        Ok(service) => service,
        Err(err) => {
            ::tracing::error!("failed to start: {}", err);
            std::process::exit(1)
        }
    };
    server::serve(&args, service).await;
    tracing::shutdown_tracing();
}

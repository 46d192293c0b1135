//! Web server

use crate::cli;

use std::{net::SocketAddr, process::exit, str::FromStr, time::Duration};

use axum::ServiceExt;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use expanduser::expanduser;
use tokio::signal;

/// Serve the vegetation anomaly API
///
/// # Arguments
///
/// * `args`: Command line arguments
/// * `service`: The [crate::app::Service] to serve
pub async fn serve(args: &cli::CommandLineArgs, service: crate::app::Service) {
    let addr = match SocketAddr::from_str(&format!("{}:{}", args.host, args.port)) {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!("invalid host name, IP address or port number: {}", err);
            exit(1)
        }
    };

    // Catch ctrl+c and try to shutdown gracefully
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(
        handle.clone(),
        args.graceful_shutdown_timeout,
    ));

    let result = if args.https {
        let abs_cert_file = absolute_path(&args.cert_file, "TLS certificate");
        let abs_key_file = absolute_path(&args.key_file, "TLS key");
        let tls_config = match RustlsConfig::from_pem_file(abs_cert_file, abs_key_file).await {
            Ok(config) => config,
            Err(err) => {
                tracing::error!("failed to load TLS certificate files: {}", err);
                exit(1)
            }
        };
        tracing::info!("listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(service.into_make_service())
            .await
    } else {
        tracing::info!("listening on http://{}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(service.into_make_service())
            .await
    };
    if let Err(err) = result {
        tracing::error!("server error: {}", err);
        exit(1)
    }
}

/// Expand `~` in `path` and make it absolute, exiting if the file does not exist.
fn absolute_path(path: &str, description: &str) -> std::path::PathBuf {
    let expanded = match expanduser(path) {
        Ok(expanded) => expanded,
        Err(err) => {
            tracing::error!(
                "failed to expand ~ in {} file path, please provide an absolute path instead: {}",
                description,
                err
            );
            exit(1)
        }
    };
    match expanded.canonicalize() {
        Ok(abs_path) => abs_path,
        Err(_) => {
            tracing::error!(
                "{} file expected at '{}' but not found.",
                description,
                expanded.display()
            );
            exit(1)
        }
    }
}

/// Graceful shutdown handler
///
/// Installs signal handlers to catch Ctrl-C or SIGTERM and trigger a graceful shutdown.
async fn shutdown_signal(handle: Handle, timeout: u64) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
    // In-flight Earth Engine computations get `timeout` seconds to finish.
    handle.graceful_shutdown(Some(Duration::from_secs(timeout)));
}

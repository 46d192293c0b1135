use crate::cli::CommandLineArgs;
use crate::earthengine::{ComputeBackend, Expression};
use crate::error::AnomalyError;
use crate::indices::VegetationIndex;
use crate::models::*;

use async_trait::async_trait;
use axum::Router;
use clap::Parser;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

/// Create a RequestData object for a year inside the default baseline.
pub(crate) fn get_test_request_data() -> RequestData {
    RequestData {
        selected_province: "Arkhangai".to_string(),
        selected_soum: "Tsetserleg".to_string(),
        selected_vegetation_index: VegetationIndex::Ndvi,
        selected_year: 2020,
        grazing_only: false,
    }
}

/// Create a TimeSeriesRequest object for the same region as [get_test_request_data].
pub(crate) fn get_test_time_series_request() -> TimeSeriesRequest {
    TimeSeriesRequest {
        selected_province: "Arkhangai".to_string(),
        selected_soum: "Tsetserleg".to_string(),
        selected_vegetation_index: VegetationIndex::Ndvi,
        grazing_only: false,
    }
}

/// Default command line arguments with a static access token.
pub(crate) fn get_test_args() -> CommandLineArgs {
    CommandLineArgs::parse_from(["vegetation-anomaly", "--ee-access-token", "test-token"])
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub(crate) async fn serve(router: Router) -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router.into_make_service())
            .await
            .unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

/// A [ComputeBackend] returning a canned result.
pub(crate) struct StubBackend {
    result: Result<Value, (u16, String)>,
    calls: AtomicUsize,
    last: Mutex<Option<Expression>>,
}

impl StubBackend {
    pub(crate) fn new(result: Value) -> Self {
        Self {
            result: Ok(result),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// A backend failing every request with an Earth Engine error.
    pub(crate) fn failing(status: u16, message: &str) -> Self {
        Self {
            result: Err((status, message.to_string())),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_expression(&self) -> Option<Expression> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComputeBackend for StubBackend {
    async fn compute(&self, expression: &Expression) -> Result<Value, AnomalyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(expression.clone());
        match &self.result {
            Ok(value) => Ok(value.clone()),
            Err((status, message)) => Err(AnomalyError::EarthEngineApi {
                status: *status,
                code: None,
                message: message.clone(),
            }),
        }
    }
}

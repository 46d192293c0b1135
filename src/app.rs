use crate::anomaly;
use crate::app_state::{AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::error::AnomalyError;
use crate::metrics::{metrics_handler, record_response_metrics, request_counter};
use crate::models::{RequestData, TimeSeriesRequest, YearlyMean};
use crate::validated_json::ValidatedJson;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::Layer;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

/// `Service` type for the application.
///
/// Requests are first passed through the [NormalizePath] layer, so that `/api/foo/` is served the
/// same as `/api/foo`.
pub type Service = NormalizePath<Router>;

/// Returns a [axum::Router] for the anomaly API.
///
/// # Arguments
///
/// * `state`: Shared application state
pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/api/fetch_anomaly_map_data", post(fetch_anomaly_map_data))
        .route("/api/fetch_index_time_series", post(fetch_index_time_series))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .on_request(request_counter)
                        .on_response(record_response_metrics),
                )
                // The map front end is served from another origin.
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Returns a [Service] for the anomaly API backed by Earth Engine.
///
/// # Arguments
///
/// * `args`: Command line arguments
pub fn service(args: &CommandLineArgs) -> Result<Service, AnomalyError> {
    let state = Arc::new(AppState::new(args)?);
    Ok(normalize(router(state)))
}

fn normalize(router: Router) -> Service {
    NormalizePathLayer::trim_trailing_slash().layer(router)
}

/// Handler for the anomaly map endpoint.
///
/// Returns the z-score of the selected year against the baseline as a GeoJSON feature
/// collection of points.
#[tracing::instrument(level = "DEBUG", skip(state))]
async fn fetch_anomaly_map_data(
    State(state): State<SharedAppState>,
    ValidatedJson(request_data): ValidatedJson<RequestData>,
) -> Result<Json<geojson::FeatureCollection>, AnomalyError> {
    let map = state
        .anomaly_cache
        .get_or_try_insert(request_data.clone(), || {
            anomaly::fetch_anomaly_map(state.backend.as_ref(), &state.pipeline, &request_data)
        })
        .await?;
    Ok(Json(map))
}

/// Handler for the time series endpoint.
#[tracing::instrument(level = "DEBUG", skip(state))]
async fn fetch_index_time_series(
    State(state): State<SharedAppState>,
    ValidatedJson(request_data): ValidatedJson<TimeSeriesRequest>,
) -> Result<Json<Vec<YearlyMean>>, AnomalyError> {
    let series = state
        .time_series_cache
        .get_or_try_insert(request_data.clone(), || {
            anomaly::fetch_time_series(state.backend.as_ref(), &state.pipeline, &request_data)
        })
        .await?;
    Ok(Json(series))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earthengine::ComputeBackend;
    use crate::test_utils::{self, StubBackend};

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_service(backend: Arc<StubBackend>) -> Service {
        let backend: Arc<dyn ComputeBackend> = backend;
        let state = AppState::with_backend(&test_utils::get_test_args(), backend).unwrap();
        normalize(router(Arc::new(state)))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn anomaly_body() -> Value {
        json!({
            "selectedProvince": "Arkhangai",
            "selectedSoum": "Tsetserleg",
            "selectedVegetationIndex": "NDVI",
            "selectedYear": 2020,
            "grazingOnly": false,
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn reversed_baseline_rejected_at_startup() {
        let mut args = test_utils::get_test_args();
        args.baseline_start = time::macros::date!(2023 - 12 - 31);
        args.baseline_end = time::macros::date!(2017 - 01 - 01);
        let backend: Arc<dyn ComputeBackend> = Arc::new(StubBackend::new(Value::Null));
        assert!(matches!(
            AppState::with_backend(&args, backend),
            Err(AnomalyError::InvalidBaseline { .. })
        ));
    }

    #[tokio::test]
    async fn anomaly_map_ok() {
        let backend = Arc::new(StubBackend::new(json!({
            "longitude": [106.0, 106.5],
            "latitude": [47.0, 47.5],
            "z_score": [1.25, null],
        })));
        let response = test_service(backend.clone())
            .oneshot(post_json("/api/fetch_anomaly_map_data", anomaly_body()))
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, response.status());
        let body = body_json(response).await;
        assert_eq!("FeatureCollection", body["type"]);
        let features = body["features"].as_array().unwrap();
        assert_eq!(2, features.len());
        assert_eq!(json!([106.0, 47.0]), features[0]["geometry"]["coordinates"]);
        assert_eq!(1.25, features[0]["properties"]["z_score"]);
        assert_eq!(Value::Null, features[1]["properties"]["z_score"]);
        assert_eq!(1, backend.calls());
    }

    #[tokio::test]
    async fn anomaly_map_trailing_slash() {
        let backend = Arc::new(StubBackend::new(json!({
            "longitude": [],
            "latitude": [],
            "z_score": [],
        })));
        let response = test_service(backend)
            .oneshot(post_json("/api/fetch_anomaly_map_data/", anomaly_body()))
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, response.status());
    }

    #[tokio::test]
    async fn anomaly_map_cached() {
        let backend = Arc::new(StubBackend::new(json!({
            "longitude": [106.0],
            "latitude": [47.0],
            "z_score": [0.5],
        })));
        let service = test_service(backend.clone());
        for _ in 0..2 {
            let response = service
                .clone()
                .oneshot(post_json("/api/fetch_anomaly_map_data", anomaly_body()))
                .await
                .unwrap();
            assert_eq!(StatusCode::OK, response.status());
        }
        assert_eq!(1, backend.calls());
    }

    #[tokio::test]
    async fn anomaly_map_missing_field() {
        let backend = Arc::new(StubBackend::new(Value::Null));
        let mut body = anomaly_body();
        body.as_object_mut().unwrap().remove("selectedSoum");
        let response = test_service(backend.clone())
            .oneshot(post_json("/api/fetch_anomaly_map_data", body))
            .await
            .unwrap();
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert_eq!(0, backend.calls());
    }

    #[tokio::test]
    async fn anomaly_map_year_out_of_baseline() {
        let backend = Arc::new(StubBackend::new(Value::Null));
        let mut body = anomaly_body();
        body["selectedYear"] = json!(2010);
        let response = test_service(backend.clone())
            .oneshot(post_json("/api/fetch_anomaly_map_data", body))
            .await
            .unwrap();
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        let body = body_json(response).await;
        assert!(body["error"]["message"].as_str().unwrap().contains("2010"));
        assert_eq!(0, backend.calls());
    }

    #[tokio::test]
    async fn anomaly_map_backend_error() {
        let backend = Arc::new(StubBackend::failing(400, "Image.select: Band not found"));
        let response = test_service(backend)
            .oneshot(post_json("/api/fetch_anomaly_map_data", anomaly_body()))
            .await
            .unwrap();
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
    }

    #[tokio::test]
    async fn anomaly_map_malformed_result() {
        let backend = Arc::new(StubBackend::new(json!({"unexpected": true})));
        let response = test_service(backend)
            .oneshot(post_json("/api/fetch_anomaly_map_data", anomaly_body()))
            .await
            .unwrap();
        assert_eq!(StatusCode::BAD_GATEWAY, response.status());
    }

    #[tokio::test]
    async fn time_series_ok() {
        let backend = Arc::new(StubBackend::new(json!([
            0.31, 0.28, null, 0.35, 0.33, 0.30, 0.29
        ])));
        let response = test_service(backend)
            .oneshot(post_json(
                "/api/fetch_index_time_series",
                json!({
                    "selectedProvince": "Arkhangai",
                    "selectedSoum": "Tsetserleg",
                    "selectedVegetationIndex": "EVI",
                    "grazingOnly": true,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, response.status());
        let body = body_json(response).await;
        let series = body.as_array().unwrap();
        assert_eq!(7, series.len());
        assert_eq!(json!({"year": 2017, "mean": 0.31}), series[0]);
        assert_eq!(json!({"year": 2019, "mean": null}), series[2]);
        assert_eq!(2023, series[6]["year"]);
    }

    #[tokio::test]
    async fn cors_preflight() {
        let backend = Arc::new(StubBackend::new(Value::Null));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/fetch_anomaly_map_data")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = test_service(backend).oneshot(request).await.unwrap();
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(
            "*",
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN]
        );
    }

    #[tokio::test]
    async fn metrics() {
        let backend = Arc::new(StubBackend::new(Value::Null));
        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = test_service(backend).oneshot(request).await.unwrap();
        assert_eq!(StatusCode::OK, response.status());
    }

    #[tokio::test]
    async fn wrong_method() {
        let backend = Arc::new(StubBackend::new(Value::Null));
        let request = Request::builder()
            .uri("/api/fetch_anomaly_map_data")
            .body(Body::empty())
            .unwrap();
        let response = test_service(backend).oneshot(request).await.unwrap();
        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status());
    }
}

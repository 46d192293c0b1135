//! Error handling.

use axum::{
    extract::rejection::JsonRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tracing::{event, Level};

/// Vegetation anomaly server error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum AnomalyError {
    /// Earth Engine credentials could not be obtained
    #[error("failed to obtain Earth Engine credentials: {reason}")]
    Authentication { reason: String },

    /// Earth Engine rejected a request or failed to evaluate it
    #[error("Earth Engine request failed with status {status}: {message}")]
    EarthEngineApi {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Error sending a request to Earth Engine or reading its response
    #[error("error communicating with Earth Engine")]
    EarthEngineTransport(#[from] reqwest::Error),

    /// Baseline period ends before it starts
    #[error("invalid baseline: {start} is after {end}")]
    InvalidBaseline { start: time::Date, end: time::Date },

    /// Invalid calendar date derived from the request or configuration
    #[error("invalid calendar date")]
    InvalidDate(#[from] time::error::ComponentRange),

    /// Season months do not describe a range within one calendar year
    #[error("invalid season: month {start} is after month {end}")]
    InvalidSeason { start: u8, end: u8 },

    /// Invalid Earth Engine endpoint URL
    #[error("invalid Earth Engine endpoint")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Earth Engine returned a value of an unexpected shape
    #[error("unexpected result from Earth Engine")]
    MalformedResult(#[from] serde_json::Error),

    /// Error deserialising request data
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating request data (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// Sampled coordinate and value lists do not line up
    #[error(
        "sample lists differ in length (longitude {longitude}, latitude {latitude}, values {values})"
    )]
    SampleLengthMismatch {
        longitude: usize,
        latitude: usize,
        values: usize,
    },

    /// Earth Engine returned a different number of yearly values than requested
    #[error("expected {expected} yearly values, got {actual}")]
    SeriesLengthMismatch { expected: usize, actual: usize },

    /// Requested year is not covered by the baseline
    #[error("year {year} is outside the baseline period {first}-{last}")]
    YearOutOfRange { year: i32, first: i32, last: i32 },
}

impl IntoResponse for AnomalyError {
    /// Convert from an `AnomalyError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut causes = Vec::new();
        let mut current = error.source();
        while let Some(source) = current {
            causes.push(source.to_string());
            current = source.source();
        }
        causes.dedup();
        let caused_by = if causes.is_empty() {
            None
        } else {
            Some(causes)
        };
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    fn bad_gateway<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_GATEWAY, error)
    }

    fn service_unavailable<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, error)
    }
}

impl From<AnomalyError> for ErrorResponse {
    /// Convert from an `AnomalyError` into an `ErrorResponse`.
    fn from(error: AnomalyError) -> Self {
        let response = match &error {
            // Bad request
            AnomalyError::RequestDataJsonRejection(_)
            | AnomalyError::RequestDataValidationSingle(_)
            | AnomalyError::RequestDataValidation(_)
            | AnomalyError::YearOutOfRange { .. } => Self::bad_request(&error),

            // Earth Engine reports evaluation errors (empty region, no scenes for a season) as
            // client errors. Those stem from the request, everything else is on our side.
            AnomalyError::EarthEngineApi { status, code, .. } => match (status, code.as_deref()) {
                (429 | 503, _) | (_, Some("RESOURCE_EXHAUSTED")) => {
                    Self::service_unavailable(&error)
                }
                (400 | 404, _) => Self::bad_request(&error),
                (401 | 403, _) => Self::internal_server_error(&error),
                _ => Self::bad_gateway(&error),
            },

            AnomalyError::EarthEngineTransport(_)
            | AnomalyError::MalformedResult(_)
            | AnomalyError::SampleLengthMismatch { .. }
            | AnomalyError::SeriesLengthMismatch { .. } => Self::bad_gateway(&error),

            // Internal server error
            AnomalyError::Authentication { .. }
            | AnomalyError::InvalidBaseline { .. }
            | AnomalyError::InvalidDate(_)
            | AnomalyError::InvalidEndpoint(_)
            | AnomalyError::InvalidSeason { .. } => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}

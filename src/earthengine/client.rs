//! The `value:compute` endpoint.

use crate::cli::CommandLineArgs;
use crate::earthengine::auth::{self, TokenProvider};
use crate::earthengine::expr::Expression;
use crate::error::AnomalyError;
use crate::metrics::EARTH_ENGINE_REQUESTS;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Something that evaluates encoded expressions.
///
/// The production implementation is [EarthEngineClient]. Handlers only see this trait, so tests
/// can substitute canned results.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    /// Evaluate `expression` and return its value as JSON.
    async fn compute(&self, expression: &Expression) -> Result<Value, AnomalyError>;
}

#[derive(Serialize)]
struct ComputeRequest<'a> {
    expression: &'a Expression,
}

#[derive(Deserialize)]
struct ComputeResponse {
    result: Value,
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    message: String,
    status: Option<String>,
}

/// HTTP client for the Earth Engine REST API.
pub struct EarthEngineClient {
    client: reqwest::Client,
    endpoint: Url,
    tokens: Box<dyn TokenProvider>,
}

impl EarthEngineClient {
    /// Create a client configured by `args`.
    pub fn new(args: &CommandLineArgs) -> Result<Self, AnomalyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(args.ee_timeout))
            .build()?;
        let tokens = auth::from_args(args, client.clone())?;
        Self::with_token_provider(client, &args.ee_api_url, &args.ee_project, tokens)
    }

    /// Create a client using an explicit token provider.
    pub fn with_token_provider(
        client: reqwest::Client,
        api_url: &Url,
        project: &str,
        tokens: Box<dyn TokenProvider>,
    ) -> Result<Self, AnomalyError> {
        let endpoint = api_url.join(&format!("v1/projects/{}/value:compute", project))?;
        tracing::debug!("Earth Engine compute endpoint: {}", endpoint);
        Ok(Self {
            client,
            endpoint,
            tokens,
        })
    }

    async fn send(&self, expression: &Expression) -> Result<reqwest::Response, AnomalyError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(token)
            .json(&ComputeRequest { expression })
            .send()
            .await?;
        Ok(response)
    }
}

/// Build an error from a non-success response body.
///
/// Falls back to the raw body when it is not a Google error envelope.
fn api_error(status: reqwest::StatusCode, body: &str) -> AnomalyError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => AnomalyError::EarthEngineApi {
            status: status.as_u16(),
            code: envelope.error.status,
            message: envelope.error.message,
        },
        Err(_) => AnomalyError::EarthEngineApi {
            status: status.as_u16(),
            code: None,
            message: body.trim().to_string(),
        },
    }
}

#[async_trait]
impl ComputeBackend for EarthEngineClient {
    #[tracing::instrument(
        level = "DEBUG",
        skip_all,
        fields(nodes = expression.values.len())
    )]
    async fn compute(&self, expression: &Expression) -> Result<Value, AnomalyError> {
        let response = match self.send(expression).await {
            Ok(response) => response,
            Err(err) => {
                EARTH_ENGINE_REQUESTS.with_label_values(&["failed"]).inc();
                return Err(err);
            }
        };
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            EARTH_ENGINE_REQUESTS.with_label_values(&["rejected"]).inc();
            return Err(api_error(status, &String::from_utf8_lossy(&body)));
        }
        EARTH_ENGINE_REQUESTS.with_label_values(&["ok"]).inc();
        let response: ComputeResponse = serde_json::from_slice(&body)?;
        Ok(response.result)
    }
}

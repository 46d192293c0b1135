//! Earth Engine credentials.
//!
//! An access token passed on the command line (for example the output of
//! `gcloud auth print-access-token`) is used as is. Without one, the server falls back once to the
//! service account of the compute instance it runs on, via the metadata server.

use crate::cli::CommandLineArgs;
use crate::error::AnomalyError;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

/// OAuth scope granting access to Earth Engine.
pub const EARTH_ENGINE_SCOPE: &str = "https://www.googleapis.com/auth/earthengine";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of OAuth bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a valid access token.
    async fn access_token(&self) -> Result<String, AnomalyError>;
}

/// A fixed, externally managed token.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, AnomalyError> {
        Ok(self.token.clone())
    }
}

/// Token response of the metadata server.
#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Tokens of the instance's default service account, cached until shortly before expiry.
pub struct MetadataServerToken {
    client: reqwest::Client,
    token_url: Url,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerToken {
    /// Create a token provider for the metadata server at `metadata_url`.
    pub fn new(client: reqwest::Client, metadata_url: &Url) -> Result<Self, AnomalyError> {
        let mut token_url = metadata_url
            .join("computeMetadata/v1/instance/service-accounts/default/token")?;
        token_url
            .query_pairs_mut()
            .append_pair("scopes", EARTH_ENGINE_SCOPE);
        Ok(Self {
            client,
            token_url,
            cached: Mutex::new(None),
        })
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn fetch(&self) -> Result<MetadataToken, AnomalyError> {
        let response = self
            .client
            .get(self.token_url.clone())
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|err| AnomalyError::Authentication {
                reason: format!("metadata server unreachable: {}", err),
            })?;
        if !response.status().is_success() {
            return Err(AnomalyError::Authentication {
                reason: format!("metadata server returned {}", response.status()),
            });
        }
        response
            .json::<MetadataToken>()
            .await
            .map_err(|err| AnomalyError::Authentication {
                reason: format!("malformed metadata server response: {}", err),
            })
    }
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    async fn access_token(&self) -> Result<String, AnomalyError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.token.clone());
            }
        }
        let fresh = self.fetch().await?;
        tracing::debug!("obtained access token valid for {}s", fresh.expires_in);
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            token: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(fresh.access_token)
    }
}

/// Select the token provider configured by `args`.
pub fn from_args(
    args: &CommandLineArgs,
    client: reqwest::Client,
) -> Result<Box<dyn TokenProvider>, AnomalyError> {
    match &args.ee_access_token {
        Some(token) => Ok(Box::new(StaticToken::new(token))),
        None => {
            tracing::info!(
                "No Earth Engine access token configured, using metadata server at {}",
                args.metadata_url
            );
            Ok(Box::new(MetadataServerToken::new(
                client,
                &args.metadata_url,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    use axum::{http::HeaderMap, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn static_token() {
        let provider = StaticToken::new("abc");
        assert_eq!("abc", provider.access_token().await.unwrap());
    }

    #[tokio::test]
    async fn metadata_token_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/computeMetadata/v1/instance/service-accounts/default/token",
            get(move |headers: HeaderMap| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if headers.get("Metadata-Flavor").map(|v| v.as_bytes()) != Some(b"Google") {
                        return Err(StatusCode::FORBIDDEN);
                    }
                    Ok(Json(json!({
                        "access_token": "token-1",
                        "expires_in": 3599,
                        "token_type": "Bearer"
                    })))
                }
            }),
        );
        let url = test_utils::serve(router).await;
        let provider = MetadataServerToken::new(reqwest::Client::new(), &url).unwrap();
        assert_eq!("token-1", provider.access_token().await.unwrap());
        assert_eq!("token-1", provider.access_token().await.unwrap());
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn metadata_token_refreshed_near_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/computeMetadata/v1/instance/service-accounts/default/token",
            get(move || {
                let counter = counter.clone();
                async move {
                    let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Json(json!({
                        "access_token": format!("token-{}", call),
                        "expires_in": 30,
                        "token_type": "Bearer"
                    }))
                }
            }),
        );
        let url = test_utils::serve(router).await;
        let provider = MetadataServerToken::new(reqwest::Client::new(), &url).unwrap();
        assert_eq!("token-1", provider.access_token().await.unwrap());
        assert_eq!("token-2", provider.access_token().await.unwrap());
        assert_eq!(2, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn metadata_server_malformed_token() {
        let router = Router::new().route(
            "/computeMetadata/v1/instance/service-accounts/default/token",
            get(|| async { Json(json!({"token_type": "Bearer"})) }),
        );
        let url = test_utils::serve(router).await;
        let provider = MetadataServerToken::new(reqwest::Client::new(), &url).unwrap();
        let error = provider.access_token().await.unwrap_err();
        assert!(matches!(error, AnomalyError::Authentication { .. }));
        let message = error.to_string();
        assert!(
            message.starts_with(
                "failed to obtain Earth Engine credentials: malformed metadata server response"
            ),
            "{}",
            message
        );
    }

    #[tokio::test]
    async fn metadata_server_error() {
        let router = Router::new().route(
            "/computeMetadata/v1/instance/service-accounts/default/token",
            get(|| async { StatusCode::NOT_FOUND }),
        );
        let url = test_utils::serve(router).await;
        let provider = MetadataServerToken::new(reqwest::Client::new(), &url).unwrap();
        let error = provider.access_token().await.unwrap_err();
        assert_eq!(
            "failed to obtain Earth Engine credentials: metadata server returned 404 Not Found",
            error.to_string()
        );
    }

    #[test]
    fn token_url_includes_scope() {
        let url = Url::parse("http://metadata.google.internal").unwrap();
        let provider = MetadataServerToken::new(reqwest::Client::new(), &url).unwrap();
        assert_eq!(
            "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token?scopes=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fearthengine",
            provider.token_url.as_str()
        );
    }
}

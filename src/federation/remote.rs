//! Remote object resolution
//!
//! Fetches ActivityPub objects (actors, key documents) from foreign
//! servers with content negotiation and per-request timeouts. The
//! [`RemoteObjectResolver`] trait is what the rest of the pipeline
//! programs against; [`HttpRemoteResolver`] is the reqwest-backed
//! production implementation.
//!
//! Each authentication attempt performs at most three fetches, all
//! sequential, each bounded by the configured timeout. Dropping the
//! future cancels an in-flight request.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::FederationConfig;
use crate::error::{AppError, FetchError};

/// ActivityPub content type requested from remote servers
pub const ACTIVITY_CONTENT_TYPE: &str = "application/activity+json";

/// Fetches and parses a remote object by URI
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteObjectResolver: Send + Sync {
    /// Fetch the object at `uri` and parse it as JSON.
    ///
    /// Failures are classified: an HTTP error status maps to
    /// [`FetchError::Status`], transport problems to
    /// [`FetchError::Transport`], and unparseable bodies to
    /// [`FetchError::Payload`].
    async fn resolve(&self, uri: &str) -> Result<serde_json::Value, FetchError>;
}

/// HTTP implementation of [`RemoteObjectResolver`]
pub struct HttpRemoteResolver {
    client: reqwest::Client,
}

impl HttpRemoteResolver {
    /// Build a resolver from federation configuration.
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new(config: &FederationConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteObjectResolver for HttpRemoteResolver {
    async fn resolve(&self, uri: &str) -> Result<serde_json::Value, FetchError> {
        use crate::metrics::REMOTE_FETCHES_TOTAL;

        tracing::debug!(uri = %uri, "Fetching remote object");

        let response = self
            .client
            .get(uri)
            .header("Accept", ACTIVITY_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| {
                REMOTE_FETCHES_TOTAL.with_label_values(&["transport"]).inc();
                FetchError::Transport {
                    uri: uri.to_string(),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let outcome = if status.is_client_error() {
                "client_error"
            } else {
                "server_error"
            };
            REMOTE_FETCHES_TOTAL.with_label_values(&[outcome]).inc();
            return Err(FetchError::Status {
                status,
                uri: uri.to_string(),
            });
        }

        let value = response.json::<serde_json::Value>().await.map_err(|e| {
            REMOTE_FETCHES_TOTAL.with_label_values(&["payload"]).inc();
            FetchError::Payload {
                uri: uri.to_string(),
                message: e.to_string(),
            }
        })?;

        REMOTE_FETCHES_TOTAL.with_label_values(&["ok"]).inc();
        Ok(value)
    }
}

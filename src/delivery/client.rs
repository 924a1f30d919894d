//! A client for posting notification payloads to webhook endpoints.

use crate::config::HttpConfig;
use crate::delivery::DeliveryError;
use async_trait::async_trait;
use reqwest::{redirect, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// The status line of a webhook response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostResponse {
    pub status_code: u16,
    pub reason: String,
}

impl PostResponse {
    /// Builds a response with the canonical reason phrase for `status_code`.
    pub fn from_status(status_code: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(status_code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or_default();
        Self {
            status_code,
            reason: reason.to_string(),
        }
    }
}

/// A trait for clients that can post JSON payloads to webhooks.
#[async_trait]
pub trait WebhookPoster: Send + Sync {
    /// Posts `payload` as JSON to `url`, exactly once.
    ///
    /// # Returns
    /// * `Ok(PostResponse)` whenever the endpoint answered, whatever the status
    /// * `Err(DeliveryError::Transport)` if no status was received
    async fn post_json(&self, url: &Url, payload: &Value) -> Result<PostResponse, DeliveryError>;
}

/// A reqwest-backed webhook client.
///
/// Redirects are never followed so that a 3xx answer reaches the caller.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    /// Creates a new `WebhookClient` with the given connect and read timeouts.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(DeliveryError::Client)?;
        Ok(Self { client })
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, DeliveryError> {
        Self::new(
            Duration::from_secs(config.connect_timeout_seconds),
            Duration::from_secs(config.read_timeout_seconds),
        )
    }
}

#[async_trait]
impl WebhookPoster for WebhookClient {
    async fn post_json(&self, url: &Url, payload: &Value) -> Result<PostResponse, DeliveryError> {
        let response = self
            .client
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        let status = response.status();
        debug!(%url, status = %status, "Webhook answered");
        Ok(PostResponse {
            status_code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }
}

//! Webhook delivery.
//!
//! The [`DeliveryDispatcher`] turns the receiver list of a change event into
//! [`DeliveryTarget`]s, posts the notification payload to each of them and
//! records the classified outcome on the subscription [`Destination`].

pub mod client;
pub mod health;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{PostResponse, WebhookClient, WebhookPoster};
pub use health::{
    Destination, DestinationHealth, DestinationRegistry, HealthStatus, RetryCandidate, Transition,
};

use crate::core::{ChangeEvent, ChannelType, NotificationAction};
use crate::recipients::RecipientResolver;
use chrono::Utc;
use futures::future::join_all;
use itertools::Itertools;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// No status was received: connection refused, timeout, TLS failure...
    #[error("delivery to {url} failed: {source}")]
    Transport {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("channel '{0}' does not deliver to webhooks")]
    NotWebhookChannel(ChannelType),
}

/// A resolved webhook address bound to the client that delivers to it.
#[derive(Clone)]
pub struct DeliveryTarget {
    url: Url,
    client: Arc<dyn WebhookPoster>,
}

impl DeliveryTarget {
    pub fn new(url: Url, client: Arc<dyn WebhookPoster>) -> Self {
        Self { url, client }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn post(&self, payload: &Value) -> Result<PostResponse, DeliveryError> {
        self.client.post_json(&self.url, payload).await
    }
}

impl fmt::Debug for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryTarget")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

/// The classified result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DeliveryOutcome {
    #[serde(rename_all = "camelCase")]
    Success { status_code: u16 },
    #[serde(rename_all = "camelCase")]
    Error { status_code: u16 },
    #[serde(rename_all = "camelCase")]
    AwaitingRetry { status_code: Option<u16> },
    /// The status fell outside the classified bands; the destination is unchanged.
    #[serde(rename_all = "camelCase")]
    Unclassified { status_code: u16 },
}

impl DeliveryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Success { .. } => "success",
            DeliveryOutcome::Error { .. } => "error",
            DeliveryOutcome::AwaitingRetry { .. } => "awaiting_retry",
            DeliveryOutcome::Unclassified { .. } => "unclassified",
        }
    }
}

impl From<&Transition> for DeliveryOutcome {
    fn from(transition: &Transition) -> Self {
        match transition {
            Transition::Success { status_code, .. } => DeliveryOutcome::Success {
                status_code: *status_code,
            },
            Transition::Error { status_code, .. } => DeliveryOutcome::Error {
                status_code: *status_code,
            },
            Transition::AwaitingRetry { status_code, .. } => DeliveryOutcome::AwaitingRetry {
                status_code: *status_code,
            },
        }
    }
}

/// The outcome of delivering to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub url: String,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

/// The outcome of dispatching one event to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub destination: Uuid,
    pub event: Uuid,
    pub targets: Vec<TargetReport>,
}

/// Builds delivery targets for change events and delivers to them.
#[derive(Clone)]
pub struct DeliveryDispatcher {
    resolver: RecipientResolver,
    client: Arc<dyn WebhookPoster>,
}

impl DeliveryDispatcher {
    pub fn new(resolver: RecipientResolver, client: Arc<dyn WebhookPoster>) -> Self {
        Self { resolver, client }
    }

    /// Resolves the receivers of `event` and binds each address to `client`.
    ///
    /// Thread events (tasks, conversations, announcements) produce no targets.
    /// Addresses that are not valid URLs are skipped, and addresses that parse
    /// to the same URL share a single target.
    #[instrument(
        skip(self, action, client, event),
        fields(event_id = %event.id, entity_type = %event.entity_type)
    )]
    pub async fn build_targets(
        &self,
        action: &NotificationAction,
        channel: ChannelType,
        client: &Arc<dyn WebhookPoster>,
        event: &ChangeEvent,
    ) -> Result<Vec<DeliveryTarget>, DispatchError> {
        if !channel.is_webhook() {
            return Err(DispatchError::NotWebhookChannel(channel));
        }
        if event.is_thread() {
            debug!("Thread events have no webhook targets");
            return Ok(Vec::new());
        }

        let receivers = self
            .resolver
            .build_receiver_list(action, channel, event.entity_id, &event.entity_type)
            .await;

        let targets = receivers
            .sorted()
            .into_iter()
            .filter_map(|address| match Url::parse(address) {
                Ok(url) => Some(DeliveryTarget::new(url, client.clone())),
                Err(e) => {
                    warn!(address, error = %e, "Skipping receiver that is not a valid URL");
                    None
                }
            })
            .unique_by(|target| target.url().clone())
            .collect();
        Ok(targets)
    }

    /// Posts `payload` to `target` once and records the outcome on `destination`.
    ///
    /// Rejections (3xx, 4xx, 5xx) are outcomes, not errors. A transport fault
    /// is returned to the caller without touching the destination.
    pub async fn deliver(
        destination: &Destination,
        target: &DeliveryTarget,
        payload: &Value,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let attempt_time = Utc::now();
        let start = Instant::now();
        let response = target.post(payload).await;
        metrics::histogram!("webhook_delivery_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                metrics::counter!("webhook_deliveries_total", "outcome" => "fault").increment(1);
                return Err(e);
            }
        };
        debug!(
            destination = %destination.id(),
            url = %target.url(),
            status = response.status_code,
            reason = %response.reason,
            "Posted notification"
        );

        let transition =
            Transition::classify(response.status_code, &response.reason, attempt_time);
        let outcome = match transition {
            Some(transition) => {
                let outcome = DeliveryOutcome::from(&transition);
                destination.record(attempt_time, transition);
                outcome
            }
            None => {
                warn!(
                    destination = %destination.id(),
                    url = %target.url(),
                    status = response.status_code,
                    "Response status leaves destination state unchanged"
                );
                DeliveryOutcome::Unclassified {
                    status_code: response.status_code,
                }
            }
        };
        metrics::counter!("webhook_deliveries_total", "outcome" => outcome.label()).increment(1);
        Ok(outcome)
    }

    /// Delivers `payload` for `event` to every target, concurrently.
    ///
    /// A transport fault on one target marks the destination as awaiting retry
    /// and does not affect the other targets.
    #[instrument(skip_all, fields(destination = %destination.id(), event = %event.id, %channel))]
    pub async fn dispatch(
        &self,
        destination: &Destination,
        action: &NotificationAction,
        channel: ChannelType,
        event: &ChangeEvent,
        payload: &Value,
    ) -> Result<DispatchReport, DispatchError> {
        let targets = self
            .build_targets(action, channel, &self.client, event)
            .await?;

        let attempts = targets.iter().map(|target| async move {
            let attempt_time = Utc::now();
            let outcome = match Self::deliver(destination, target, payload).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        url = %target.url(),
                        error = %e,
                        "Delivery failed, destination awaits retry"
                    );
                    let status_code = None;
                    destination.record(
                        attempt_time,
                        Transition::AwaitingRetry {
                            status_code,
                            reason: e.to_string(),
                        },
                    );
                    DeliveryOutcome::AwaitingRetry { status_code }
                }
            };
            TargetReport {
                url: target.url().to_string(),
                outcome,
            }
        });
        let reports = join_all(attempts).await;

        info!(targets = reports.len(), "Dispatched notification");
        Ok(DispatchReport {
            destination: destination.id(),
            event: event.id,
            targets: reports,
        })
    }
}

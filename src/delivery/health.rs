//! Destination health tracking.
//!
//! Every subscription destination carries a [`DestinationHealth`] record
//! describing the outcome of its most recent delivery attempt. The record is
//! overwritten by each attempt; the external retry scheduler reads it through
//! the [`DestinationRegistry`] to find destinations awaiting retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// The health state of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    /// Never attempted.
    #[default]
    Unknown,
    Success,
    /// Transient failure, eligible for a later re-attempt.
    AwaitingRetry,
    /// Permanent failure, such as a redirect.
    Error,
}

/// The last recorded delivery outcome of a destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationHealth {
    pub status: HealthStatus,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub status_code: Option<u16>,
    pub reason: Option<String>,
}

/// A state change caused by one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Success {
        status_code: u16,
        completed_at: DateTime<Utc>,
    },
    Error {
        status_code: u16,
        reason: String,
    },
    AwaitingRetry {
        /// `None` when the attempt failed before any status was received.
        status_code: Option<u16>,
        reason: String,
    },
}

impl Transition {
    /// Classifies an HTTP answer.
    ///
    /// Only 200 counts as success; 3xx is an error and 4xx/5xx await retry.
    /// Any other status returns `None` and leaves the destination untouched.
    pub fn classify(status_code: u16, reason: &str, completed_at: DateTime<Utc>) -> Option<Self> {
        match status_code {
            200 => Some(Transition::Success {
                status_code,
                completed_at,
            }),
            300..=399 => Some(Transition::Error {
                status_code,
                reason: reason.to_string(),
            }),
            400..=599 => Some(Transition::AwaitingRetry {
                status_code: Some(status_code),
                reason: reason.to_string(),
            }),
            _ => None,
        }
    }
}

impl DestinationHealth {
    /// Applies the outcome of an attempt started at `attempt_time`.
    ///
    /// Returns `false`, leaving the record unchanged, if a later attempt has
    /// already been recorded.
    pub fn apply(&mut self, attempt_time: DateTime<Utc>, transition: Transition) -> bool {
        if self.last_attempt.is_some_and(|last| attempt_time < last) {
            return false;
        }
        self.last_attempt = Some(attempt_time);
        match transition {
            Transition::Success {
                status_code,
                completed_at,
            } => {
                self.status = HealthStatus::Success;
                self.last_success = Some(completed_at);
                self.status_code = Some(status_code);
                self.reason = None;
            }
            Transition::Error {
                status_code,
                reason,
            } => {
                self.status = HealthStatus::Error;
                self.last_failure = Some(attempt_time);
                self.status_code = Some(status_code);
                self.reason = Some(reason);
            }
            Transition::AwaitingRetry {
                status_code,
                reason,
            } => {
                self.status = HealthStatus::AwaitingRetry;
                self.last_failure = Some(attempt_time);
                self.status_code = status_code;
                self.reason = Some(reason);
            }
        }
        true
    }
}

/// A shared handle on one destination's health record.
///
/// Clones refer to the same record; transitions are applied under a lock.
#[derive(Debug, Clone)]
pub struct Destination {
    id: Uuid,
    health: Arc<Mutex<DestinationHealth>>,
}

impl Destination {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            health: Arc::new(Mutex::new(DestinationHealth::default())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Records the outcome of an attempt started at `attempt_time`.
    pub fn record(&self, attempt_time: DateTime<Utc>, transition: Transition) -> bool {
        let applied = self
            .health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(attempt_time, transition);
        if !applied {
            debug!(
                destination = %self.id,
                %attempt_time,
                "Discarding outcome of a superseded attempt"
            );
        }
        applied
    }

    pub fn snapshot(&self) -> DestinationHealth {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> HealthStatus {
        self.snapshot().status
    }
}

/// A destination waiting to be re-attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryCandidate {
    pub destination: Uuid,
    pub last_attempt: DateTime<Utc>,
    pub status_code: Option<u16>,
}

/// All known destinations, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct DestinationRegistry {
    destinations: Arc<Mutex<HashMap<Uuid, Destination>>>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the destination with `id`, creating it in the `Unknown` state.
    pub fn register(&self, id: Uuid) -> Destination {
        self.destinations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert_with(|| Destination::new(id))
            .clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Destination> {
        self.destinations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn snapshot(&self, id: Uuid) -> Option<DestinationHealth> {
        self.get(id).map(|destination| destination.snapshot())
    }

    /// Destinations in the `AwaitingRetry` state, oldest attempt first.
    pub fn awaiting_retry(&self) -> Vec<RetryCandidate> {
        let destinations: Vec<Destination> = self
            .destinations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut candidates: Vec<RetryCandidate> = destinations
            .iter()
            .filter_map(|destination| {
                let health = destination.snapshot();
                match (health.status, health.last_attempt) {
                    (HealthStatus::AwaitingRetry, Some(last_attempt)) => Some(RetryCandidate {
                        destination: destination.id(),
                        last_attempt,
                        status_code: health.status_code,
                    }),
                    _ => None,
                }
            })
            .collect();
        candidates.sort_by_key(|candidate| candidate.last_attempt);
        candidates
    }
}

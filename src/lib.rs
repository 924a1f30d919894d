/// Fanout - Event notification fan-out
///
/// This library resolves who should be notified about a change to a tracked
/// entity, delivers the notification to every resolved webhook, and tracks
/// the delivery health of each subscription destination.
pub mod cli;
pub mod config;
pub mod core;
pub mod delivery;
pub mod internal_metrics;
pub mod profile;
pub mod recipients;
pub mod scenario;
pub mod store;

// Re-export core types for convenience
pub use crate::core::*;
pub use delivery::{DeliveryDispatcher, DeliveryOutcome, DeliveryTarget, DispatchReport};
pub use recipients::{ReceiverList, RecipientResolver};

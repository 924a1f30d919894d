//! # Internal Metrics
//!
//! Fanout reports through the `metrics` facade:
//!
//! - `webhook_deliveries_total{outcome}`: delivery attempts by classified outcome
//! - `webhook_delivery_duration_seconds`: time spent waiting on webhook endpoints
//! - `recipient_resolution_failures_total{category}`: recipient categories lost
//!   to store failures
//!
//! The [`LoggingRecorder`] keeps them in memory so that the command-line
//! front end can log a summary before exiting.

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use metrics_util::registry::{AtomicStorage, Registry};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

/// Registers descriptions for every metric with the installed recorder.
pub fn describe() {
    metrics::describe_counter!(
        "webhook_deliveries_total",
        Unit::Count,
        "Total number of webhook delivery attempts, labeled by outcome."
    );
    metrics::describe_histogram!(
        "webhook_delivery_duration_seconds",
        Unit::Seconds,
        "The time in seconds spent posting a notification to a webhook."
    );
    metrics::describe_counter!(
        "recipient_resolution_failures_total",
        Unit::Count,
        "Total number of recipient categories that could not be resolved, labeled by category."
    );
}

/// A metrics recorder that holds all captured metrics in memory.
pub struct LoggingRecorder {
    registry: Arc<Registry<Key, AtomicStorage>>,
}

/// A read handle on the metrics captured by a [`LoggingRecorder`].
#[derive(Clone)]
pub struct MetricsSummary {
    registry: Arc<Registry<Key, AtomicStorage>>,
}

impl LoggingRecorder {
    /// Creates a new `LoggingRecorder` and the summary handle reading from it.
    pub fn new() -> (Self, MetricsSummary) {
        let registry = Arc::new(Registry::new(AtomicStorage));
        let summary = MetricsSummary {
            registry: registry.clone(),
        };
        (Self { registry }, summary)
    }
}

impl Recorder for LoggingRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.registry.get_or_create_counter(key, |c| c.clone()).into()
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        self.registry.get_or_create_gauge(key, |g| g.clone()).into()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        self.registry.get_or_create_histogram(key, |h| h.clone()).into()
    }
}

impl MetricsSummary {
    /// Current counter values, keyed by `name{label=value,...}`.
    pub fn counters(&self) -> BTreeMap<String, u64> {
        self.registry
            .get_counter_handles()
            .into_iter()
            .map(|(key, counter)| (render_key(&key), counter.load(Ordering::Relaxed)))
            .collect()
    }

    /// Sample count and mean of each histogram.
    pub fn histograms(&self) -> BTreeMap<String, (usize, f64)> {
        self.registry
            .get_histogram_handles()
            .into_iter()
            .map(|(key, histogram)| {
                let samples = histogram.data();
                let mean = if samples.is_empty() {
                    0.0
                } else {
                    samples.iter().sum::<f64>() / samples.len() as f64
                };
                (render_key(&key), (samples.len(), mean))
            })
            .collect()
    }

    /// Logs every captured metric at info level.
    pub fn log(&self) {
        info!("--- Metrics Summary ---");
        for (key, value) in self.counters() {
            info!("[Counter] {}: {}", key, value);
        }
        for (key, (count, mean)) in self.histograms() {
            info!("[Histogram] {}: count={} mean={:.3}", key, count, mean);
        }
    }
}

fn render_key(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|label| format!("{}={}", label.key(), label.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

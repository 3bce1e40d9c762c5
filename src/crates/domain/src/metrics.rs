//! Metrics sink abstraction.
//!
//! The pipeline emits counters and duration observations labeled by
//! feature, model and error classification. The sink itself is an external
//! collaborator; components receive it by constructor injection.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Label pairs attached to a metric event.
pub type Labels<'a> = &'a [(&'a str, &'a str)];

/// Destination for pipeline metrics.
pub trait MetricsSink: Send + Sync {
    /// Increment a named counter by one.
    fn incr_counter(&self, name: &str, labels: Labels<'_>);

    /// Record the duration of one operation.
    fn observe_duration(&self, name: &str, labels: Labels<'_>, duration: Duration);
}

/// Sink that discards everything; the default when no backend is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr_counter(&self, _name: &str, _labels: Labels<'_>) {}

    fn observe_duration(&self, _name: &str, _labels: Labels<'_>, _duration: Duration) {}
}

/// One recorded counter increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterEvent {
    pub name: String,
    pub labels: Vec<(String, String)>,
}

/// In-memory sink used by tests to assert on emitted metrics.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    counters: Mutex<Vec<CounterEvent>>,
    durations: Mutex<Vec<(String, Duration)>>,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Counter events recorded so far.
    pub fn counters(&self) -> Vec<CounterEvent> {
        self.counters.lock().clone()
    }

    /// Total increments of `name` whose labels include every pair in `want`.
    pub fn counter_total(&self, name: &str, want: Labels<'_>) -> usize {
        self.counters
            .lock()
            .iter()
            .filter(|event| {
                event.name == name
                    && want.iter().all(|(k, v)| {
                        event
                            .labels
                            .iter()
                            .any(|(ek, ev)| ek == k && ev == v)
                    })
            })
            .count()
    }

    pub fn durations(&self) -> Vec<(String, Duration)> {
        self.durations.lock().clone()
    }
}

impl MetricsSink for RecordingMetrics {
    fn incr_counter(&self, name: &str, labels: Labels<'_>) {
        self.counters.lock().push(CounterEvent {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }

    fn observe_duration(&self, name: &str, _labels: Labels<'_>, duration: Duration) {
        self.durations.lock().push((name.to_string(), duration));
    }
}

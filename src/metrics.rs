//! Metrics instrumentation for kallax.
//!
//! All metrics are prefixed with `kallax.`; the Prometheus exporter renders
//! dots as underscores.

use hickory_proto::rr::RecordType;
use metrics::{counter, histogram};
use std::time::{Duration, Instant};

use crate::error::ResolveError;

/// Name of the per-message processing time histogram.
pub const PROCESSING_TIME: &str = "kallax.query_processing_time";

/// Bucket boundaries (seconds) of [`PROCESSING_TIME`].
pub const PROCESSING_TIME_BUCKETS: &[f64] = &[
    0.0025, 0.005, 0.01, 0.02, 0.03, 0.04, 0.05, 0.06, 0.07, 0.08, 0.09, 0.1, 0.12, 0.15, 0.17,
    0.2, 0.25, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 3.0, 5.0, 8.0, 10.0,
];

/// Record how long handling one message took.
pub fn record_processing_time(duration: Duration) {
    histogram!(PROCESSING_TIME).record(duration.as_secs_f64());
}

/// Outcome of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// Question answered (possibly with zero records).
    Answered,
    /// Name did not match the grammar.
    NotMatched,
    /// Task had no address on the requested network.
    NotAttached,
    /// Label decoding or an orchestrator call failed.
    Error,
    /// Question outside the base domain.
    Refused,
}

impl From<&ResolveError> for QueryResult {
    fn from(e: &ResolveError) -> Self {
        match e {
            ResolveError::NameNotMatched(_) => QueryResult::NotMatched,
            ResolveError::NotAttached { .. } => QueryResult::NotAttached,
            _ => QueryResult::Error,
        }
    }
}

/// Record a processed question.
pub fn record_question(rtype: RecordType, result: QueryResult) {
    let result_str = match result {
        QueryResult::Answered => "answered",
        QueryResult::NotMatched => "not_matched",
        QueryResult::NotAttached => "not_attached",
        QueryResult::Error => "error",
        QueryResult::Refused => "refused",
    };

    counter!("kallax.question.count", "type" => rtype.to_string(), "result" => result_str)
        .increment(1);
}

/// Record endpoints returned by a group resolution.
pub fn record_endpoints_returned(count: usize) {
    histogram!("kallax.group.endpoints_returned").record(count as f64);
}

/// Record a node name cache lookup.
pub fn record_node_cache(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!("kallax.node_cache.lookup.count", "outcome" => outcome).increment(1);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

//! Metrics and observability utilities
//!
//! Prometheus-style metrics for crawl runs with standardized naming.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all CiteForge metrics
pub const METRICS_PREFIX: &str = "citeforge";

/// Buckets for remote call latency (in seconds); PDF downloads dominate the tail
pub const FETCH_BUCKETS: &[f64] = &[
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_fetch_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Remote call attempts by call kind and outcome"
    );

    describe_histogram!(
        format!("{}_fetch_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Remote call latency in seconds"
    );

    describe_counter!(
        format!("{}_publications_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Publications that reached a terminal visit state, by outcome"
    );

    describe_counter!(
        format!("{}_citations_discovered_total", METRICS_PREFIX),
        Unit::Count,
        "Distinct citation edges recorded"
    );

    describe_gauge!(
        format!("{}_frontier_size", METRICS_PREFIX),
        Unit::Count,
        "Identifiers waiting in the frontier"
    );

    describe_counter!(
        format!("{}_store_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Rejected catalog or graph store writes"
    );

    tracing::info!("Metrics registered");
}

/// Record one attempt of a metadata or document call
pub fn record_fetch_attempt(call: &'static str, outcome: &'static str, duration_secs: f64) {
    counter!(
        format!("{}_fetch_attempts_total", METRICS_PREFIX),
        "call" => call,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_fetch_duration_seconds", METRICS_PREFIX),
        "call" => call
    )
    .record(duration_secs);
}

/// Record a publication reaching Done (`done`, `partial`) or Failed (`failed`)
pub fn record_processed(outcome: &'static str, edges: usize) {
    counter!(
        format!("{}_publications_processed_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    counter!(format!("{}_citations_discovered_total", METRICS_PREFIX)).increment(edges as u64);
}

pub fn record_frontier_size(size: usize) {
    gauge!(format!("{}_frontier_size", METRICS_PREFIX)).set(size as f64);
}

pub fn record_store_failure(store: &'static str) {
    counter!(
        format!("{}_store_failures_total", METRICS_PREFIX),
        "store" => store
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in FETCH_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        // No global recorder installed: recording must be a no-op
        record_fetch_attempt("metadata", "ok", 0.2);
        record_processed("done", 3);
        record_frontier_size(7);
        record_store_failure("graph");
    }
}

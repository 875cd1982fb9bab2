//! Prometheus metrics for lookups and pipeline runs.
//!
//! This module provides metrics for:
//! - Lookup client (requests by outcome, latency)
//! - Dispatcher (retries)
//! - Collector (rows emitted)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Lookup Metrics
// =============================================================================

/// Lookups total by service and outcome.
pub static LOOKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("isbnfill_lookups_total", "Total lookups performed"),
        &["service", "outcome"], // "found", "not_found", or the failure kind
    )
    .unwrap()
});

/// Lookup duration in seconds.
pub static LOOKUP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "isbnfill_lookup_duration_seconds",
            "Duration of lookup requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service"],
    )
    .unwrap()
});

/// Retry attempts issued by the dispatcher.
pub static LOOKUP_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("isbnfill_lookup_retries_total", "Total lookup retries"),
        &["service", "kind"], // kind: failure that triggered the retry
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Enriched rows handed to the sink.
pub static ROWS_EMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("isbnfill_rows_emitted_total", "Total enriched rows emitted").unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(LOOKUPS_TOTAL.clone()),
        Box::new(LOOKUP_DURATION.clone()),
        Box::new(LOOKUP_RETRIES.clone()),
        Box::new(ROWS_EMITTED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        LOOKUPS_TOTAL
            .with_label_values(&["test_service", "found"])
            .inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "isbnfill_lookups_total"));
    }
}

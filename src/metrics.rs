//! Operational metrics with Prometheus
//!
//! Only lifecycle operations record metrics. Routing, statistics and report
//! generation stay side-effect free.
//!
//! Counters aggregate across every manager in the process. The per-status
//! gauge is not tracked incrementally: it holds the counts of whichever
//! manager last called [`crate::ab_testing::LifecycleManager::publish_metrics`].
//!
//! NOTE: test ids and content ids are never used as labels to keep
//! cardinality bounded.

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::ab_testing::{LifecycleSummary, TestStatus};

lazy_static! {
    /// Crate metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    /// Test creation attempts
    pub static ref TESTS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("headliner_tests_created_total", "Total test creation attempts"),
        &["result"]
    ).unwrap();

    /// Lifecycle transitions by action and outcome
    pub static ref LIFECYCLE_TRANSITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "headliner_lifecycle_transitions_total",
            "Total lifecycle transition attempts"
        ),
        &["action", "result"]
    ).unwrap();

    /// Tests per status in the last published registry snapshot
    pub static ref TESTS_BY_STATUS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("headliner_tests_by_status", "Tests in the registry by status"),
        &["status"]
    ).unwrap();
}

/// Register all metrics with the crate registry
///
/// Registering twice is not an error.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let collectors: [Box<dyn Collector>; 3] = [
        Box::new(TESTS_CREATED_TOTAL.clone()),
        Box::new(LIFECYCLE_TRANSITIONS_TOTAL.clone()),
        Box::new(TESTS_BY_STATUS.clone()),
    ];
    for collector in collectors {
        match METRICS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Render the registry in the Prometheus text format
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&METRICS_REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

pub(crate) fn record_created(ok: bool) {
    TESTS_CREATED_TOTAL
        .with_label_values(&[if ok { "ok" } else { "rejected" }])
        .inc();
}

pub(crate) fn record_transition(action: &str, accepted: bool) {
    LIFECYCLE_TRANSITIONS_TOTAL
        .with_label_values(&[action, if accepted { "ok" } else { "rejected" }])
        .inc();
}

/// Overwrite the per-status gauge with one registry's counts
pub(crate) fn publish_status_counts(summary: &LifecycleSummary) {
    for status in TestStatus::ALL {
        let count = match status {
            TestStatus::Draft => summary.draft,
            TestStatus::Active => summary.active,
            TestStatus::Paused => summary.paused,
            TestStatus::Completed => summary.completed,
            TestStatus::Cancelled => summary.cancelled,
        };
        TESTS_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_transition_counters_exported() {
        register_metrics().unwrap();
        record_transition("start", true);
        record_transition("complete", false);

        let text = gather_text().unwrap();
        assert!(text.contains("headliner_lifecycle_transitions_total"));
        assert!(text.contains("action=\"complete\""));
    }
}

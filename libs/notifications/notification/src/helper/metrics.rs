//! Prometheus metrics for the notification helper.

use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for helper publishes, labelled by service and operation.
///
/// Clones share the local failure count, so acknowledgement tasks can record
/// into the helper that spawned them.
#[derive(Clone)]
pub struct HelperMetrics {
    service: String,
    failures: Arc<AtomicU64>,
}

impl HelperMetrics {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Failures recorded through this instance or any of its clones.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Record a successful publish or bucket write.
    pub fn published(&self, operation: &'static str) {
        counter!(
            "notification_helper_publish_total",
            "service" => self.service.clone(),
            "operation" => operation
        )
        .increment(1);
    }

    /// Record a swallowed publish or bucket write failure.
    pub fn failed(&self, operation: &'static str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        counter!(
            "notification_helper_failures_total",
            "service" => self.service.clone(),
            "operation" => operation
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_clones_share_failure_count() {
        let metrics = HelperMetrics::new("sharing");
        let task_copy = metrics.clone();

        task_copy.failed("trigger_notification");
        metrics.failed("register_template");
        metrics.published("trigger_notification");

        assert_eq!(metrics.failure_count(), 2);
        assert_eq!(task_copy.failure_count(), 2);
    }

    #[test]
    fn test_counters_are_labelled() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let metrics = HelperMetrics::new("sharing");
            metrics.published("trigger_notification");
            metrics.published("trigger_notification");
            metrics.failed("register_template");
        });
        assert_eq!(HelperMetrics::new("other").failure_count(), 0);

        let rendered = handle.render();
        let published = rendered
            .lines()
            .find(|l| l.starts_with("notification_helper_publish_total{"))
            .unwrap();
        assert!(published.contains(r#"service="sharing""#));
        assert!(published.contains(r#"operation="trigger_notification""#));
        assert!(published.ends_with(" 2"));

        let failed = rendered
            .lines()
            .find(|l| l.starts_with("notification_helper_failures_total{"))
            .unwrap();
        assert!(failed.contains(r#"operation="register_template""#));
        assert!(failed.ends_with(" 1"));
    }
}

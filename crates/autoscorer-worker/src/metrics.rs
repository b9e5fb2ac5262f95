//! Prometheus metrics for worker observability and autoscaling signals.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ActionLabel(pub String);

impl prometheus_client::encoding::EncodeLabelSet for ActionLabel {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("action", self.0.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct WorkerMetrics {
    pub queue_depth: Gauge,
    pub active_jobs: Gauge,
    pub jobs_completed: Family<ActionLabel, Counter>,
    pub jobs_failed: Family<ActionLabel, Counter>,
    pub callback_deliveries: Counter,
    registry: Arc<Registry>,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let queue_depth = Gauge::default();
        registry.register("autoscorer_worker_queue_depth", "Pending messages on the job stream", queue_depth.clone());

        let active_jobs = Gauge::default();
        registry.register("autoscorer_worker_active_jobs", "Jobs currently being executed", active_jobs.clone());

        let jobs_completed = Family::<ActionLabel, Counter>::default();
        registry.register(
            "autoscorer_worker_jobs_completed_total",
            "Jobs completed successfully, by action",
            jobs_completed.clone(),
        );

        let jobs_failed = Family::<ActionLabel, Counter>::default();
        registry.register(
            "autoscorer_worker_jobs_failed_total",
            "Jobs that finished with an error, by action",
            jobs_failed.clone(),
        );

        let callback_deliveries = Counter::default();
        registry.register(
            "autoscorer_worker_callback_deliveries_total",
            "Result callbacks handed to the HTTP client",
            callback_deliveries.clone(),
        );

        Self { queue_depth, active_jobs, jobs_completed, jobs_failed, callback_deliveries, registry: Arc::new(registry) }
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        encode(&mut buf, &self.registry).unwrap();
        buf
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_all_metrics() {
        let metrics = WorkerMetrics::new();
        let output = metrics.encode();
        assert!(output.contains("autoscorer_worker_queue_depth"));
        assert!(output.contains("autoscorer_worker_active_jobs"));
        assert!(output.contains("autoscorer_worker_jobs_completed_total"));
        assert!(output.contains("autoscorer_worker_jobs_failed_total"));
    }

    #[test]
    fn family_counter_with_labels() {
        let metrics = WorkerMetrics::new();
        metrics.jobs_completed.get_or_create(&ActionLabel("score".to_string())).inc();
        metrics.jobs_completed.get_or_create(&ActionLabel("pipeline".to_string())).inc();
        metrics.jobs_completed.get_or_create(&ActionLabel("pipeline".to_string())).inc();

        let output = metrics.encode();
        assert!(output.contains("action=\"score\""));
        assert!(output.contains("action=\"pipeline\""));
    }

    #[test]
    fn gauge_set_reflected_in_encode() {
        let metrics = WorkerMetrics::new();
        metrics.queue_depth.set(4);
        let output = metrics.encode();
        assert!(output.contains("autoscorer_worker_queue_depth 4"), "{output}");
    }
}

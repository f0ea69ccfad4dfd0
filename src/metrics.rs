//! Prometheus metrics reported by the aggregation engine.

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Handles are cheap to clone and share their underlying values.
#[derive(Clone, Debug, Default)]
pub struct AggregatorMetrics {
    pub tasks_initialized: Counter,
    pub tasks_completed: Counter,
    pub tasks_expired: Counter,
    pub active_tasks: Gauge,
    pub signatures_processed: Counter,
    pub signatures_rejected: Counter,
}

impl AggregatorMetrics {
    /// Creates the metric handles and registers them under the `bls_aggregator` prefix.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        let registry = registry.sub_registry_with_prefix("bls_aggregator");
        registry.register(
            "tasks_initialized",
            "Tasks registered for aggregation",
            metrics.tasks_initialized.clone(),
        );
        registry.register(
            "tasks_completed",
            "Tasks that reached their stake threshold",
            metrics.tasks_completed.clone(),
        );
        registry.register(
            "tasks_expired",
            "Tasks that expired before reaching their stake threshold",
            metrics.tasks_expired.clone(),
        );
        registry.register(
            "active_tasks",
            "Tasks still collecting signatures",
            metrics.active_tasks.clone(),
        );
        registry.register(
            "signatures_processed",
            "Signatures verified and aggregated",
            metrics.signatures_processed.clone(),
        );
        registry.register(
            "signatures_rejected",
            "Signatures rejected by validation",
            metrics.signatures_rejected.clone(),
        );
        metrics
    }
}

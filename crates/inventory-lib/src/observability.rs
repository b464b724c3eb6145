//! Observability infrastructure for the inventory pipeline
//!
//! Provides:
//! - Prometheus metrics (pass latency, resources per kind, collector and backend errors,
//!   translation outcomes, text-generation latency)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge_vec, Histogram,
    IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for network-bound latencies (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<InventoryMetricsInner> = OnceLock::new();

struct InventoryMetricsInner {
    pass_latency_seconds: Histogram,
    resources_collected: IntGaugeVec,
    collector_errors: IntCounterVec,
    backend_errors: IntCounterVec,
    translation_outcomes: IntCounterVec,
    generation_latency_seconds: Histogram,
}

impl InventoryMetricsInner {
    fn new() -> Self {
        Self {
            pass_latency_seconds: register_histogram!(
                "cloud_inventory_collection_pass_seconds",
                "Wall time of one full collection pass",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_pass_seconds"),

            resources_collected: register_int_gauge_vec!(
                "cloud_inventory_resources",
                "Resources in the latest unified table, by kind",
                &["service_type"]
            )
            .expect("Failed to register resources"),

            collector_errors: register_int_counter_vec!(
                "cloud_inventory_collector_errors_total",
                "Collector kinds that failed a pass",
                &["service_type"]
            )
            .expect("Failed to register collector_errors"),

            backend_errors: register_int_counter_vec!(
                "cloud_inventory_backend_errors_total",
                "Failed backend calls absorbed by the pipeline",
                &["site", "kind"]
            )
            .expect("Failed to register backend_errors"),

            translation_outcomes: register_int_counter_vec!(
                "cloud_inventory_query_translations_total",
                "Query translation results by outcome",
                &["outcome"]
            )
            .expect("Failed to register query_translations"),

            generation_latency_seconds: register_histogram!(
                "cloud_inventory_text_generation_seconds",
                "Latency of text-generation calls",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register text_generation_seconds"),
        }
    }
}

/// Lightweight handle to the global metrics instance
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct InventoryMetrics {
    _private: (),
}

impl Default for InventoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(InventoryMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &InventoryMetricsInner {
        GLOBAL_METRICS.get_or_init(InventoryMetricsInner::new)
    }

    pub fn observe_pass_latency(&self, duration_secs: f64) {
        self.inner().pass_latency_seconds.observe(duration_secs);
    }

    pub fn set_resources(&self, service_type: &str, count: i64) {
        self.inner()
            .resources_collected
            .with_label_values(&[service_type])
            .set(count);
    }

    pub fn inc_collector_errors(&self, service_type: &str) {
        self.inner()
            .collector_errors
            .with_label_values(&[service_type])
            .inc();
    }

    /// Count an absorbed backend failure at a call site (e.g. `metric`, `cost`, `enumerate`)
    pub fn inc_backend_errors(&self, site: &str, kind: &str) {
        self.inner()
            .backend_errors
            .with_label_values(&[site, kind])
            .inc();
    }

    pub fn inc_translation(&self, outcome: &str) {
        self.inner()
            .translation_outcomes
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn observe_generation_latency(&self, duration_secs: f64) {
        self.inner().generation_latency_seconds.observe(duration_secs);
    }
}

/// Structured logger for pipeline events
///
/// Every record carries an `event` field so logs can be filtered by kind.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a finished collection pass
    pub fn log_collection_pass(&self, resources: usize, kinds_ok: usize, kinds_total: usize, elapsed_ms: u128) {
        if kinds_ok == kinds_total {
            info!(
                event = "collection_pass",
                instance = %self.instance,
                resources = resources,
                kinds_ok = kinds_ok,
                kinds_total = kinds_total,
                elapsed_ms = elapsed_ms,
                "Collection pass complete"
            );
        } else {
            warn!(
                event = "collection_pass",
                instance = %self.instance,
                resources = resources,
                kinds_ok = kinds_ok,
                kinds_total = kinds_total,
                elapsed_ms = elapsed_ms,
                "Collection pass complete with failed collectors"
            );
        }
    }

    /// Log a collector kind whose result was replaced by an empty slot
    pub fn log_collector_failed(&self, service_type: &str, error: &str) {
        warn!(
            event = "collector_failed",
            instance = %self.instance,
            service_type = %service_type,
            error = %error,
            "Collector failed, continuing without its resources"
        );
    }

    /// Log a translation result: `parsed`, `unparsed` or `unavailable`
    pub fn log_query_translated(&self, outcome: &str, predicate: Option<&str>) {
        info!(
            event = "query_translated",
            instance = %self.instance,
            outcome = %outcome,
            predicate = ?predicate,
            "Query translated"
        );
    }

    /// Log a query answered with the unfiltered table
    pub fn log_query_fallback(&self, reason: &str) {
        warn!(
            event = "query_fallback",
            instance = %self.instance,
            reason = %reason,
            "Returning unfiltered table"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, regions: &[String]) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            regions = ?regions,
            "Inventory agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Inventory agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_metrics_creation() {
        // Handles share the process-wide registry, so creating several is fine
        let metrics = InventoryMetrics::new();
        let other = InventoryMetrics::new();

        metrics.observe_pass_latency(1.5);
        metrics.set_resources("EC2", 3);
        metrics.inc_collector_errors("RDS");
        metrics.inc_backend_errors("metric", "timeout");
        other.inc_translation("parsed");
        other.observe_generation_latency(0.8);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("inventory-1");
        assert_eq!(logger.instance, "inventory-1");
        logger.log_query_fallback("translation unavailable");
    }
}

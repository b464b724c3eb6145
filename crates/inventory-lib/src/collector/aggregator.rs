//! Aggregator: fan-out over every collector, fan-in into one table

use super::ResourceCollector;
use crate::models::{ResourceRecord, ResourceTable, ServiceType};
use crate::observability::{InventoryMetrics, StructuredLogger};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error};

/// Outcome of one collection pass
#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub table: ResourceTable,
    /// Kinds whose collector returned normally
    pub succeeded: Vec<ServiceType>,
    /// Kinds replaced by an empty result
    pub failed: Vec<ServiceType>,
    pub elapsed: Duration,
}

impl CollectionReport {
    pub fn kinds_total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs every collector concurrently and concatenates their records
pub struct Aggregator {
    collectors: Vec<Arc<dyn ResourceCollector>>,
    logger: StructuredLogger,
    metrics: InventoryMetrics,
}

impl Aggregator {
    /// Collectors are concatenated in the order given here
    pub fn new(collectors: Vec<Arc<dyn ResourceCollector>>) -> Self {
        Self {
            collectors,
            logger: StructuredLogger::new("aggregator"),
            metrics: InventoryMetrics::new(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn kinds(&self) -> Vec<ServiceType> {
        self.collectors.iter().map(|c| c.service_type()).collect()
    }

    /// The unified table; empty if every collector failed
    pub async fn collect_all(&self) -> ResourceTable {
        self.run_pass().await.table
    }

    /// One full pass with per-kind success information
    pub async fn run_pass(&self) -> CollectionReport {
        let start = Instant::now();
        let mut tasks = JoinSet::new();

        for (slot, collector) in self.collectors.iter().enumerate() {
            let collector = Arc::clone(collector);
            tasks.spawn(async move { (slot, collector.collect().await) });
        }

        // A slot left empty means the task failed or panicked
        let mut slots: Vec<Option<Vec<ResourceRecord>>> = vec![None; self.collectors.len()];

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, Ok(records))) => {
                    debug!(
                        service_type = %self.collectors[slot].service_type(),
                        count = records.len(),
                        "Collector finished"
                    );
                    slots[slot] = Some(records);
                }
                Ok((slot, Err(e))) => {
                    let kind = self.collectors[slot].service_type();
                    self.logger.log_collector_failed(kind.label(), &format!("{:#}", e));
                }
                Err(e) => {
                    error!(error = %e, "Collector task aborted");
                }
            }
        }

        let mut table = ResourceTable::default();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for (collector, slot) in self.collectors.iter().zip(slots) {
            let kind = collector.service_type();
            match slot {
                Some(records) => {
                    self.metrics.set_resources(kind.label(), records.len() as i64);
                    table.append(records);
                    succeeded.push(kind);
                }
                None => {
                    self.metrics.inc_collector_errors(kind.label());
                    failed.push(kind);
                }
            }
        }

        let elapsed = start.elapsed();
        self.metrics.observe_pass_latency(elapsed.as_secs_f64());
        self.logger.log_collection_pass(
            table.len(),
            succeeded.len(),
            self.collectors.len(),
            elapsed.as_millis(),
        );

        CollectionReport {
            table,
            succeeded,
            failed,
            elapsed,
        }
    }
}

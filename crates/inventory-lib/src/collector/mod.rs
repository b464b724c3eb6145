//! Per-service resource collectors
//!
//! One collector per resource kind enumerates native resources across the
//! effective regions (or globally, for region-less kinds) and assembles a
//! [`ResourceRecord`] for each by calling the metric and cost fetchers.
//! Failures are absorbed at the smallest unit: one resource, one region,
//! one kind.

mod aggregator;
mod bucket;
mod compute;
mod database;
mod function;

#[cfg(test)]
mod tests;

pub use aggregator::{Aggregator, CollectionReport};
pub use bucket::BucketCollector;
pub use compute::ComputeCollector;
pub use database::DatabaseCollector;
pub use function::FunctionCollector;

use crate::backend::{bounded, BackendResult, InventoryBackend, DEFAULT_CALL_TIMEOUT};
use crate::fetcher::{CostFetcher, MetricFetcher};
use crate::models::{ResourceRecord, ServiceType, CANONICAL_TIME_FORMAT};
use crate::observability::InventoryMetrics;
use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use async_trait::async_trait;

/// Regions used when discovery fails or returns nothing
pub const DEFAULT_REGIONS: [&str; 3] = ["us-east-1", "us-west-2", "ap-northeast-2"];

/// Trait for one resource kind's collector
#[async_trait]
pub trait ResourceCollector: Send + Sync {
    /// Kind of every record this collector produces
    fn service_type(&self) -> ServiceType;

    /// Fully enumerate the kind and return its records
    ///
    /// An `Err` is treated by the aggregator as an empty result for the kind.
    async fn collect(&self) -> Result<Vec<ResourceRecord>>;
}

/// Tuning shared by every collector
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Upper bound on each enumeration call (default: 10 seconds)
    pub call_timeout: Duration,
    /// Resources assembled concurrently within one kind (default: 1, sequential)
    pub per_resource_concurrency: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            per_resource_concurrency: 1,
        }
    }
}

/// Backend handles, fetchers and regions injected into every collector
#[derive(Clone)]
pub struct CollectorContext {
    pub inventory: Arc<dyn InventoryBackend>,
    pub metrics: MetricFetcher,
    pub costs: CostFetcher,
    pub regions: Arc<[String]>,
    pub config: CollectionConfig,
    telemetry: InventoryMetrics,
}

impl CollectorContext {
    pub fn new(
        inventory: Arc<dyn InventoryBackend>,
        metrics: MetricFetcher,
        costs: CostFetcher,
        regions: Vec<String>,
        config: CollectionConfig,
    ) -> Self {
        Self {
            inventory,
            metrics: metrics.with_call_timeout(config.call_timeout),
            costs: costs.with_call_timeout(config.call_timeout),
            regions: regions.into(),
            config,
            telemetry: InventoryMetrics::new(),
        }
    }

    /// Run one enumeration call; a failure is logged and yields `None`
    async fn enumerate<T, F>(&self, service_type: ServiceType, scope: &str, call: F) -> Option<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        match bounded(self.config.call_timeout, call).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.telemetry.inc_backend_errors("enumerate", e.kind());
                warn!(
                    service_type = %service_type,
                    scope = %scope,
                    error = %e,
                    "Enumeration failed, skipping"
                );
                None
            }
        }
    }

    /// Assemble records for `items`, skipping any whose assembly fails
    ///
    /// Up to `per_resource_concurrency` assemblies run at once; output keeps
    /// enumeration order.
    async fn assemble_all<T, F, Fut>(
        &self,
        service_type: ServiceType,
        items: Vec<T>,
        assemble: F,
    ) -> Vec<ResourceRecord>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<ResourceRecord>>,
    {
        let results: Vec<Result<ResourceRecord>> = stream::iter(items)
            .map(assemble)
            .buffered(self.config.per_resource_concurrency.max(1))
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|result| match result {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(service_type = %service_type, error = %e, "Skipping resource");
                    None
                }
            })
            .collect()
    }
}

/// Collectors for every kind, in declaration order
pub fn create_collectors(context: &CollectorContext) -> Vec<Arc<dyn ResourceCollector>> {
    vec![
        Arc::new(ComputeCollector::new(context.clone())),
        Arc::new(DatabaseCollector::new(context.clone())),
        Arc::new(FunctionCollector::new(context.clone())),
        Arc::new(BucketCollector::new(context.clone())),
    ]
}

/// Regions enabled for the account, or [`DEFAULT_REGIONS`] if discovery fails
pub async fn discover_regions(inventory: &dyn InventoryBackend, timeout: Duration) -> Vec<String> {
    match bounded(timeout, inventory.list_regions()).await {
        Ok(regions) if !regions.is_empty() => {
            info!(count = regions.len(), "Discovered regions");
            regions
        }
        Ok(_) => {
            warn!("Region discovery returned nothing, using defaults");
            default_regions()
        }
        Err(e) => {
            warn!(error = %e, "Region discovery failed, using defaults");
            default_regions()
        }
    }
}

pub fn default_regions() -> Vec<String> {
    DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect()
}

/// Parse a native timestamp in any of the shapes the backends emit
///
/// Accepts RFC 3339, `2024-01-01T12:00:00.000+0000` and the canonical format.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(raw, CANONICAL_TIME_FORMAT) {
        Ok(naive) => Some(naive.and_utc()),
        Err(_) => {
            debug!(raw = %raw, "Unrecognized timestamp");
            None
        }
    }
}

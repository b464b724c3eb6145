//! Metric fetcher
//!
//! For each declared metric of a resource kind, requests the average over a
//! trailing window and keeps the most recent datapoint.

use crate::backend::{
    bounded, Datapoint, MetricDimension, MetricQuery, MetricsBackend, Statistic,
    DEFAULT_CALL_TIMEOUT,
};
use crate::models::{MetricSample, ServiceType};
use crate::observability::InventoryMetrics;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One declared metric and the unit it is reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub unit: &'static str,
}

/// Namespace, dimension and metric list for one resource kind
#[derive(Debug, Clone, Copy)]
pub struct MetricCatalog {
    pub namespace: &'static str,
    pub dimension: &'static str,
    pub metrics: &'static [MetricSpec],
}

const fn spec(name: &'static str, unit: &'static str) -> MetricSpec {
    MetricSpec { name, unit }
}

static COMPUTE: MetricCatalog = MetricCatalog {
    namespace: "AWS/EC2",
    dimension: "InstanceId",
    metrics: &[
        spec("CPUUtilization", "Percent"),
        spec("NetworkIn", "Bytes"),
        spec("NetworkOut", "Bytes"),
        spec("DiskReadBytes", "Bytes"),
        spec("DiskWriteBytes", "Bytes"),
    ],
};

static MANAGED_DB: MetricCatalog = MetricCatalog {
    namespace: "AWS/RDS",
    dimension: "DBInstanceIdentifier",
    metrics: &[
        spec("CPUUtilization", "Percent"),
        spec("FreeableMemory", "Bytes"),
        spec("DatabaseConnections", "Count"),
        spec("ReadIOPS", "Count/Second"),
        spec("WriteIOPS", "Count/Second"),
    ],
};

static FUNCTION: MetricCatalog = MetricCatalog {
    namespace: "AWS/Lambda",
    dimension: "FunctionName",
    metrics: &[
        spec("Invocations", "Count"),
        spec("Duration", "Milliseconds"),
        spec("Errors", "Count"),
        spec("Throttles", "Count"),
    ],
};

/// Metric catalog for a kind; object stores have none
pub fn catalog(service_type: ServiceType) -> Option<&'static MetricCatalog> {
    match service_type {
        ServiceType::Compute => Some(&COMPUTE),
        ServiceType::ManagedDb => Some(&MANAGED_DB),
        ServiceType::Function => Some(&FUNCTION),
        ServiceType::ObjectStore => None,
    }
}

/// Fetches recent performance samples for one resource
#[derive(Clone)]
pub struct MetricFetcher {
    backend: Arc<dyn MetricsBackend>,
    call_timeout: Duration,
    window: chrono::Duration,
    period_secs: u32,
    metrics: InventoryMetrics,
}

impl MetricFetcher {
    /// Create a fetcher with a one-hour window and one-hour period
    pub fn new(backend: Arc<dyn MetricsBackend>) -> Self {
        Self {
            backend,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            window: chrono::Duration::hours(1),
            period_secs: 3600,
            metrics: InventoryMetrics::new(),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_window(mut self, window: chrono::Duration, period_secs: u32) -> Self {
        self.window = window;
        self.period_secs = period_secs;
        self
    }

    /// Latest sample of every declared metric that has data
    ///
    /// Unsupported kinds yield an empty mapping. A failing metric is skipped;
    /// an unreachable backend abandons the resource and yields an empty mapping.
    pub async fn fetch(
        &self,
        resource_id: &str,
        service_type: ServiceType,
        region: &str,
    ) -> BTreeMap<String, MetricSample> {
        let Some(catalog) = catalog(service_type) else {
            return BTreeMap::new();
        };

        let end_time = Utc::now();
        let start_time = end_time - self.window;
        let mut samples = BTreeMap::new();

        for metric in catalog.metrics {
            let query = MetricQuery {
                namespace: catalog.namespace.to_string(),
                metric_name: metric.name.to_string(),
                dimensions: vec![MetricDimension {
                    name: catalog.dimension.to_string(),
                    value: resource_id.to_string(),
                }],
                start_time,
                end_time,
                period: self.period_secs,
                statistics: vec![Statistic::Average],
            };

            match bounded(
                self.call_timeout,
                self.backend.metric_statistics(region, &query),
            )
            .await
            {
                Ok(points) => {
                    if let Some(average) = Datapoint::latest(&points).and_then(|p| p.average) {
                        samples.insert(metric.name.to_string(), MetricSample::new(average, metric.unit));
                    } else {
                        debug!(
                            resource_id = %resource_id,
                            metric = metric.name,
                            "No datapoints in window"
                        );
                    }
                }
                Err(e) if e.is_fatal_for_fetcher() => {
                    self.metrics.inc_backend_errors("metric", e.kind());
                    warn!(
                        resource_id = %resource_id,
                        region = %region,
                        error = %e,
                        "Metrics backend unavailable, dropping metrics for resource"
                    );
                    return BTreeMap::new();
                }
                Err(e) => {
                    self.metrics.inc_backend_errors("metric", e.kind());
                    warn!(
                        resource_id = %resource_id,
                        metric = metric.name,
                        error = %e,
                        "Failed to fetch metric"
                    );
                }
            }
        }

        samples
    }
}

//! Cost fetcher
//!
//! Trailing-window unblended spend for one resource. Any failure, or a
//! window with no results, yields `0.0`.

use crate::backend::{
    bounded, BillingBackend, CostDimension, CostQuery, CostResponse, FilterExpression,
    Granularity, InventoryBackend, DEFAULT_CALL_TIMEOUT,
};
use crate::models::{clamp_cost, ServiceType};
use crate::observability::InventoryMetrics;
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lookback of the dimension-filtered cost query
pub const COST_WINDOW_DAYS: u64 = 30;

/// Lookback of the resource-level query; the backend caps it at 14 days
pub const RESOURCE_COST_WINDOW_DAYS: u64 = 14;

/// How a resource's cost is looked up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostStrategy {
    /// Region and billing category filter over 30 days
    #[default]
    Dimension,
    /// Resource-level query over 14 days, narrowed by the resource's `Name` tag
    NameTagged,
}

/// Fetches trailing-window spend for one resource
#[derive(Clone)]
pub struct CostFetcher {
    billing: Arc<dyn BillingBackend>,
    inventory: Arc<dyn InventoryBackend>,
    strategy: CostStrategy,
    call_timeout: Duration,
    metrics: InventoryMetrics,
}

impl CostFetcher {
    pub fn new(billing: Arc<dyn BillingBackend>, inventory: Arc<dyn InventoryBackend>) -> Self {
        Self {
            billing,
            inventory,
            strategy: CostStrategy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            metrics: InventoryMetrics::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: CostStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn strategy(&self) -> CostStrategy {
        self.strategy
    }

    /// Spend for the resource over the strategy's window; `0.0` on any failure
    pub async fn fetch(&self, resource_id: &str, service_type: ServiceType, region: &str) -> f64 {
        let today = Utc::now().date_naive();
        let result = match self.strategy {
            CostStrategy::Dimension => self.by_dimension(today, service_type, region).await,
            CostStrategy::NameTagged => {
                self.by_resource(today, resource_id, service_type, region).await
            }
        };

        match result {
            Some(amount) => clamp_cost(amount),
            None => 0.0,
        }
    }

    async fn by_dimension(
        &self,
        today: NaiveDate,
        service_type: ServiceType,
        region: &str,
    ) -> Option<f64> {
        let query = CostQuery::unblended(window_start(today, COST_WINDOW_DAYS), today, Granularity::Monthly)
            .with_filter(FilterExpression::And(vec![
                FilterExpression::dimension(CostDimension::Region, region),
                FilterExpression::dimension(CostDimension::Service, service_type.billing_category()),
            ]));

        let response = bounded(self.call_timeout, self.billing.cost_and_usage(&query)).await;
        self.absorb(response, service_type, region)
    }

    async fn by_resource(
        &self,
        today: NaiveDate,
        resource_id: &str,
        service_type: ServiceType,
        region: &str,
    ) -> Option<f64> {
        let name_tag = match bounded(
            self.call_timeout,
            self.inventory.describe_tags(region, resource_id),
        )
        .await
        {
            Ok(tags) => tags.into_iter().find(|t| t.key == "Name").map(|t| t.value),
            Err(e) => {
                debug!(resource_id = %resource_id, error = %e, "Name tag lookup failed");
                None
            }
        };

        let mut filters = vec![
            FilterExpression::dimension(CostDimension::Region, region),
            FilterExpression::dimension(CostDimension::Service, service_type.billing_category()),
            FilterExpression::dimension(CostDimension::ResourceId, resource_id),
        ];
        if let Some(name) = &name_tag {
            filters.push(FilterExpression::tag("Name", name.clone()));
        }

        let query = CostQuery::unblended(
            window_start(today, RESOURCE_COST_WINDOW_DAYS),
            today,
            Granularity::Monthly,
        )
        .with_filter(FilterExpression::And(filters));

        let response = bounded(
            self.call_timeout,
            self.billing.cost_and_usage_with_resources(&query),
        )
        .await;
        self.absorb(response, service_type, region)
    }

    fn absorb(
        &self,
        response: Result<CostResponse, crate::error::BackendError>,
        service_type: ServiceType,
        region: &str,
    ) -> Option<f64> {
        match response {
            Ok(response) if response.results_by_time.is_empty() => None,
            Ok(response) => Some(
                response
                    .results_by_time
                    .iter()
                    .filter_map(|period| period.unblended_total())
                    .sum(),
            ),
            Err(e) => {
                self.metrics.inc_backend_errors("cost", e.kind());
                warn!(
                    service_type = %service_type,
                    region = %region,
                    error = %e,
                    "Failed to fetch cost, using 0.0"
                );
                None
            }
        }
    }
}

fn window_start(today: NaiveDate, days: u64) -> NaiveDate {
    today.checked_sub_days(Days::new(days)).unwrap_or(today)
}

//! Account-level cost breakdowns and a naive per-service forecast

use crate::backend::{
    bounded, BillingBackend, CostDimension, CostQuery, CostResponse, Granularity,
    DEFAULT_CALL_TIMEOUT,
};
use crate::models::{clamp_cost, ServiceType};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Lookback of the breakdowns
pub const ANALYSIS_WINDOW_DAYS: u64 = 30;

/// Days in the forecast horizon
const DAYS_PER_MONTH: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCost {
    pub service: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCost {
    pub region: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCost {
    pub date: NaiveDate,
    pub service: String,
    pub cost: f64,
}

/// Spend over the trailing window by service, by region and by day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostAnalysis {
    pub service_costs: Vec<ServiceCost>,
    pub region_costs: Vec<RegionCost>,
    pub daily_costs: Vec<DailyCost>,
}

impl CostAnalysis {
    pub fn total(&self) -> f64 {
        self.service_costs.iter().map(|s| s.cost).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostPrediction {
    pub current_daily_avg: f64,
    pub predicted_daily_avg: f64,
    pub trend: Trend,
    pub predicted_next_month: f64,
}

impl CostPrediction {
    /// Forecast from non-zero daily costs in chronological order
    ///
    /// The trend is `(last - first) / n`, added once to the mean.
    pub fn from_daily(costs: &[f64]) -> Option<Self> {
        if costs.is_empty() {
            return None;
        }

        let n = costs.len() as f64;
        let current_daily_avg = costs.iter().sum::<f64>() / n;
        let slope = if costs.len() > 1 {
            (costs[costs.len() - 1] - costs[0]) / n
        } else {
            0.0
        };
        let predicted = current_daily_avg + slope;

        let trend = if slope > 0.0 {
            Trend::Increasing
        } else if slope < 0.0 {
            Trend::Decreasing
        } else {
            Trend::Stable
        };

        Some(Self {
            current_daily_avg,
            predicted_daily_avg: predicted.max(0.0),
            trend,
            predicted_next_month: (predicted * DAYS_PER_MONTH).max(0.0),
        })
    }
}

/// Reads account-level spend from the billing backend
#[derive(Clone)]
pub struct CostAnalyzer {
    billing: Arc<dyn BillingBackend>,
    call_timeout: Duration,
}

impl CostAnalyzer {
    pub fn new(billing: Arc<dyn BillingBackend>) -> Self {
        Self {
            billing,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    async fn run(&self, query: CostQuery, what: &str) -> Option<CostResponse> {
        match bounded(self.call_timeout, self.billing.cost_and_usage(&query)).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(query = %what, error = %e, "Cost query failed");
                None
            }
        }
    }

    /// Breakdowns over the trailing 30 days; `None` if any query fails
    pub async fn analyze(&self) -> Option<CostAnalysis> {
        let (start, end) = window(ANALYSIS_WINDOW_DAYS);

        let by_service = self
            .run(
                CostQuery::unblended(start, end, Granularity::Monthly).grouped_by(CostDimension::Service),
                "service",
            )
            .await?;
        let by_region = self
            .run(
                CostQuery::unblended(start, end, Granularity::Monthly).grouped_by(CostDimension::Region),
                "region",
            )
            .await?;
        let daily = self
            .run(
                CostQuery::unblended(start, end, Granularity::Daily).grouped_by(CostDimension::Service),
                "daily",
            )
            .await?;

        Some(CostAnalysis {
            service_costs: sum_groups(&by_service)
                .into_iter()
                .map(|(service, cost)| ServiceCost { service, cost })
                .collect(),
            region_costs: sum_groups(&by_region)
                .into_iter()
                .map(|(region, cost)| RegionCost { region, cost })
                .collect(),
            daily_costs: daily
                .results_by_time
                .iter()
                .flat_map(|period| {
                    period.groups.iter().filter_map(move |group| {
                        Some(DailyCost {
                            date: period.time_period.start,
                            service: group.keys.first()?.clone(),
                            cost: clamp_cost(group.unblended()?),
                        })
                    })
                })
                .collect(),
        })
    }

    /// Forecast per tracked service from the last `days` of daily spend
    ///
    /// Services with no non-zero days are omitted; `None` if the query fails.
    pub async fn predict(&self, days: u64) -> Option<BTreeMap<ServiceType, CostPrediction>> {
        let (start, end) = window(days);
        let daily = self
            .run(
                CostQuery::unblended(start, end, Granularity::Daily).grouped_by(CostDimension::Service),
                "prediction",
            )
            .await?;

        let mut predictions = BTreeMap::new();
        for kind in ServiceType::ALL {
            let costs: Vec<f64> = daily
                .results_by_time
                .iter()
                .flat_map(|period| period.groups.iter())
                .filter(|group| group.keys.first().map(String::as_str) == Some(kind.billing_category()))
                .filter_map(|group| group.unblended())
                .filter(|cost| *cost > 0.0)
                .collect();

            if let Some(prediction) = CostPrediction::from_daily(&costs) {
                predictions.insert(kind, prediction);
            }
        }

        Some(predictions)
    }
}

fn window(days: u64) -> (NaiveDate, NaiveDate) {
    let end = Utc::now().date_naive();
    (end.checked_sub_days(Days::new(days)).unwrap_or(end), end)
}

/// Group totals summed across every period, sorted by cost descending
fn sum_groups(response: &CostResponse) -> Vec<(String, f64)> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for group in response.results_by_time.iter().flat_map(|p| p.groups.iter()) {
        if let (Some(key), Some(cost)) = (group.keys.first(), group.unblended()) {
            *totals.entry(key.clone()).or_insert(0.0) += clamp_cost(cost);
        }
    }

    let mut totals: Vec<(String, f64)> = totals.into_iter().collect();
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CostEntry, FixtureBackend};

    fn entry(days_ago: u64, kind: ServiceType, region: &str, amount: f64) -> CostEntry {
        CostEntry {
            date: Utc::now().date_naive() - Days::new(days_ago),
            service: kind.billing_category().to_string(),
            region: region.to_string(),
            resource_id: None,
            tags: BTreeMap::new(),
            amount,
        }
    }

    fn analyzer(costs: Vec<CostEntry>) -> CostAnalyzer {
        CostAnalyzer::new(Arc::new(FixtureBackend {
            costs,
            ..Default::default()
        }))
    }

    #[test]
    fn test_prediction_trend() {
        let prediction = CostPrediction::from_daily(&[2.0, 4.0, 6.0]).unwrap();
        assert_eq!(prediction.current_daily_avg, 4.0);
        assert_eq!(prediction.trend, Trend::Increasing);
        // (6 - 2) / 3 added to the mean
        assert!((prediction.predicted_daily_avg - (4.0 + 4.0 / 3.0)).abs() < 1e-9);
        assert!((prediction.predicted_next_month - prediction.predicted_daily_avg * 30.0).abs() < 1e-9);

        let single = CostPrediction::from_daily(&[5.0]).unwrap();
        assert_eq!(single.trend, Trend::Stable);
        assert_eq!(single.predicted_daily_avg, 5.0);

        assert!(CostPrediction::from_daily(&[]).is_none());
    }

    #[test]
    fn test_prediction_never_negative() {
        let prediction = CostPrediction::from_daily(&[10.0, 0.1]).unwrap();
        assert_eq!(prediction.trend, Trend::Decreasing);
        assert!(prediction.predicted_daily_avg >= 0.0);
        assert!(prediction.predicted_next_month >= 0.0);
    }

    #[tokio::test]
    async fn test_analyze_groups_by_service_and_region() {
        let analysis = analyzer(vec![
            entry(2, ServiceType::Compute, "us-east-1", 10.0),
            entry(3, ServiceType::Compute, "us-west-2", 5.0),
            entry(3, ServiceType::Function, "us-east-1", 1.0),
        ])
        .analyze()
        .await
        .unwrap();

        assert_eq!(analysis.service_costs[0].service, ServiceType::Compute.billing_category());
        assert_eq!(analysis.service_costs[0].cost, 15.0);
        assert_eq!(analysis.region_costs[0].region, "us-east-1");
        assert_eq!(analysis.region_costs[0].cost, 11.0);
        assert_eq!(analysis.daily_costs.len(), 3);
        assert_eq!(analysis.total(), 16.0);
    }

    #[tokio::test]
    async fn test_analyze_returns_none_on_failure() {
        let analyzer = CostAnalyzer::new(Arc::new(FixtureBackend::default().fail("ce", "*")));
        assert!(analyzer.analyze().await.is_none());
        assert!(analyzer.predict(30).await.is_none());
    }

    #[tokio::test]
    async fn test_predict_skips_zero_days_and_untracked_services() {
        let mut costs = vec![
            entry(3, ServiceType::ManagedDb, "us-east-1", 2.0),
            entry(2, ServiceType::ManagedDb, "us-east-1", 0.0),
            entry(1, ServiceType::ManagedDb, "us-east-1", 4.0),
        ];
        costs.push(CostEntry {
            service: "Amazon Route 53".to_string(),
            ..entry(1, ServiceType::Compute, "global", 3.0)
        });

        let predictions = analyzer(costs).predict(30).await.unwrap();
        assert_eq!(predictions.len(), 1);

        let db = &predictions[&ServiceType::ManagedDb];
        assert_eq!(db.current_daily_avg, 3.0);
        assert_eq!(db.trend, Trend::Increasing);
    }
}

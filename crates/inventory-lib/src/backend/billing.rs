//! Billing backend: cost-and-usage queries

use super::BackendResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cost metric the pipeline reads
pub const UNBLENDED_COST: &str = "UnblendedCost";

/// Cost-and-usage queries against the billing backend
#[async_trait]
pub trait BillingBackend: Send + Sync {
    /// Cost grouped or filtered by dimensions
    async fn cost_and_usage(&self, query: &CostQuery) -> BackendResult<CostResponse>;

    /// Same as [`cost_and_usage`](Self::cost_and_usage) but allows
    /// `RESOURCE_ID` filters; the backend limits the window to 14 days
    async fn cost_and_usage_with_resources(&self, query: &CostQuery)
        -> BackendResult<CostResponse>;
}

/// Half-open date range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Granularity {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostDimension {
    Region,
    Service,
    ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimensionValues {
    pub key: CostDimension,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagValues {
    pub key: String,
    pub values: Vec<String>,
}

/// Filter expression in the billing backend's wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterExpression {
    And(Vec<FilterExpression>),
    Dimensions(DimensionValues),
    Tags(TagValues),
}

impl FilterExpression {
    pub fn dimension(key: CostDimension, value: impl Into<String>) -> Self {
        FilterExpression::Dimensions(DimensionValues {
            key,
            values: vec![value.into()],
        })
    }

    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        FilterExpression::Tags(TagValues {
            key: key.into(),
            values: vec![value.into()],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupDefinition {
    #[serde(rename = "Type")]
    pub group_type: String,
    pub key: CostDimension,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostQuery {
    pub time_period: DateInterval,
    pub granularity: Granularity,
    pub metrics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<GroupDefinition>,
}

impl CostQuery {
    /// Unblended cost over `[start, end)` with no filter or grouping
    pub fn unblended(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> Self {
        Self {
            time_period: DateInterval { start, end },
            granularity,
            metrics: vec![UNBLENDED_COST.to_string()],
            filter: None,
            group_by: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn grouped_by(mut self, key: CostDimension) -> Self {
        self.group_by.push(GroupDefinition {
            group_type: "DIMENSION".to_string(),
            key,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    pub amount: String,
    #[serde(default)]
    pub unit: Option<String>,
}

impl MetricValue {
    pub fn usd(amount: f64) -> Self {
        Self {
            amount: format!("{:.10}", amount),
            unit: Some("USD".to_string()),
        }
    }

    /// Parsed amount; `None` for malformed decimals
    pub fn value(&self) -> Option<f64> {
        self.amount.trim().parse::<f64>().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostGroup {
    pub keys: Vec<String>,
    pub metrics: HashMap<String, MetricValue>,
}

impl CostGroup {
    pub fn unblended(&self) -> Option<f64> {
        self.metrics.get(UNBLENDED_COST).and_then(MetricValue::value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultByTime {
    pub time_period: DateInterval,
    #[serde(default)]
    pub total: HashMap<String, MetricValue>,
    #[serde(default)]
    pub groups: Vec<CostGroup>,
}

impl ResultByTime {
    pub fn unblended_total(&self) -> Option<f64> {
        self.total.get(UNBLENDED_COST).and_then(MetricValue::value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostResponse {
    #[serde(default)]
    pub results_by_time: Vec<ResultByTime>,
}

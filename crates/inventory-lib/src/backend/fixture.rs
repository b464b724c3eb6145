//! In-memory backend snapshot
//!
//! Serves a fixed set of native resources, metric series and cost entries
//! through the same traits as the live gateway. Used by tests and by the
//! agent's offline mode. Failures can be injected per call and scope with
//! keys like `rds:us-west-2`, `s3:list` or `cloudwatch:*`.

use super::billing::{
    BillingBackend, CostDimension, CostGroup, CostQuery, CostResponse, DateInterval,
    FilterExpression, Granularity, MetricValue, ResultByTime, UNBLENDED_COST,
};
use super::inventory::{
    Bucket, DbInstance, FunctionConfiguration, FunctionPage, InventoryBackend, Reservation, Tag,
};
use super::metrics::{Datapoint, MetricQuery, MetricsBackend};
use super::BackendResult;
use crate::error::BackendError;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Maximum window accepted by the resource-level cost query
const RESOURCE_COST_MAX_DAYS: i64 = 14;

const DEFAULT_PAGE_SIZE: usize = 50;

/// Datapoints for one (resource, metric) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSeries {
    pub resource_id: String,
    pub metric_name: String,
    pub datapoints: Vec<Datapoint>,
}

/// One day of spend attributed to a service, region and optionally a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub date: NaiveDate,
    pub service: String,
    pub region: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub amount: f64,
}

impl CostEntry {
    fn dimension(&self, key: CostDimension) -> Option<&str> {
        match key {
            CostDimension::Region => Some(&self.region),
            CostDimension::Service => Some(&self.service),
            CostDimension::ResourceId => self.resource_id.as_deref(),
        }
    }

    fn matches(&self, filter: &FilterExpression) -> bool {
        match filter {
            FilterExpression::And(parts) => parts.iter().all(|part| self.matches(part)),
            FilterExpression::Dimensions(dim) => self
                .dimension(dim.key)
                .map(|value| dim.values.iter().any(|v| v == value))
                .unwrap_or(false),
            FilterExpression::Tags(tag) => self
                .tags
                .get(&tag.key)
                .map(|value| tag.values.contains(value))
                .unwrap_or(false),
        }
    }
}

/// Snapshot of native backend state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureBackend {
    pub regions: Vec<String>,
    /// Reservations keyed by region
    pub instances: BTreeMap<String, Vec<Reservation>>,
    /// Database instances keyed by region
    pub db_instances: BTreeMap<String, Vec<DbInstance>>,
    /// Functions keyed by region
    pub functions: BTreeMap<String, Vec<FunctionConfiguration>>,
    /// Function tags keyed by ARN
    pub function_tags: BTreeMap<String, BTreeMap<String, String>>,
    pub buckets: Vec<Bucket>,
    /// Location constraint keyed by bucket name; absent means the default region
    pub bucket_locations: BTreeMap<String, String>,
    /// Tag sets keyed by bucket name; absent means no tag set
    pub bucket_tags: BTreeMap<String, Vec<Tag>>,
    /// Tags keyed by resource id, served by `describe_tags`
    pub resource_tags: BTreeMap<String, Vec<Tag>>,
    pub metrics: Vec<MetricSeries>,
    pub costs: Vec<CostEntry>,
    /// Injected failures: `call:scope` or `call:*`
    pub failures: BTreeSet<String>,
    /// Functions per page; 0 uses the default
    pub page_size: usize,
}

impl FixtureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))
    }

    /// Make `call` fail for `scope` (a region, bucket name, `list` or `*`)
    pub fn fail(mut self, call: &str, scope: &str) -> Self {
        self.failures.insert(format!("{}:{}", call, scope));
        self
    }

    fn check(&self, call: &str, scope: &str) -> BackendResult<()> {
        if self.failures.contains(&format!("{}:{}", call, scope))
            || self.failures.contains(&format!("{}:*", call))
        {
            return Err(BackendError::Status {
                code: 500,
                message: format!("injected failure for {} in {}", call, scope),
            });
        }
        Ok(())
    }

    fn periods(interval: &DateInterval, granularity: Granularity) -> Vec<DateInterval> {
        let mut periods = Vec::new();
        let mut cursor = interval.start;

        while cursor < interval.end {
            let next = match granularity {
                Granularity::Daily => cursor.checked_add_days(Days::new(1)),
                Granularity::Monthly => first_of_next_month(cursor),
            }
            .map(|d| d.min(interval.end))
            .unwrap_or(interval.end);

            periods.push(DateInterval {
                start: cursor,
                end: next,
            });
            cursor = next;
        }

        periods
    }

    fn evaluate(&self, query: &CostQuery) -> CostResponse {
        let matching: Vec<&CostEntry> = self
            .costs
            .iter()
            .filter(|entry| query.time_period.contains(entry.date))
            .filter(|entry| query.filter.as_ref().map_or(true, |f| entry.matches(f)))
            .collect();

        let results_by_time = Self::periods(&query.time_period, query.granularity)
            .into_iter()
            .map(|period| {
                let in_period = matching.iter().filter(|e| period.contains(e.date));

                if query.group_by.is_empty() {
                    let total: f64 = in_period.map(|e| e.amount).sum();
                    ResultByTime {
                        time_period: period,
                        total: HashMap::from([(UNBLENDED_COST.to_string(), MetricValue::usd(total))]),
                        groups: Vec::new(),
                    }
                } else {
                    let mut grouped: BTreeMap<Vec<String>, f64> = BTreeMap::new();
                    for entry in in_period {
                        let keys = query
                            .group_by
                            .iter()
                            .map(|g| entry.dimension(g.key).unwrap_or("NoResourceId").to_string())
                            .collect();
                        *grouped.entry(keys).or_insert(0.0) += entry.amount;
                    }

                    ResultByTime {
                        time_period: period,
                        total: HashMap::new(),
                        groups: grouped
                            .into_iter()
                            .map(|(keys, amount)| CostGroup {
                                keys,
                                metrics: HashMap::from([(
                                    UNBLENDED_COST.to_string(),
                                    MetricValue::usd(amount),
                                )]),
                            })
                            .collect(),
                    }
                }
            })
            .collect();

        CostResponse { results_by_time }
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn mentions_resource_id(filter: &FilterExpression) -> bool {
    match filter {
        FilterExpression::And(parts) => parts.iter().any(mentions_resource_id),
        FilterExpression::Dimensions(dim) => dim.key == CostDimension::ResourceId,
        FilterExpression::Tags(_) => false,
    }
}

#[async_trait]
impl InventoryBackend for FixtureBackend {
    async fn list_regions(&self) -> BackendResult<Vec<String>> {
        self.check("regions", "list")?;
        Ok(self.regions.clone())
    }

    async fn describe_instances(&self, region: &str) -> BackendResult<Vec<Reservation>> {
        self.check("ec2", region)?;
        Ok(self.instances.get(region).cloned().unwrap_or_default())
    }

    async fn describe_db_instances(&self, region: &str) -> BackendResult<Vec<DbInstance>> {
        self.check("rds", region)?;
        Ok(self.db_instances.get(region).cloned().unwrap_or_default())
    }

    async fn list_functions(
        &self,
        region: &str,
        marker: Option<&str>,
    ) -> BackendResult<FunctionPage> {
        self.check("lambda", region)?;

        let all = self.functions.get(region).map(Vec::as_slice).unwrap_or_default();
        let page_size = if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        };
        let start = match marker {
            Some(m) => m
                .parse::<usize>()
                .map_err(|_| BackendError::Decode(format!("invalid marker {}", m)))?,
            None => 0,
        };
        let end = (start + page_size).min(all.len());

        Ok(FunctionPage {
            functions: all.get(start..end).map(<[_]>::to_vec).unwrap_or_default(),
            next_marker: (end < all.len()).then(|| end.to_string()),
        })
    }

    async fn list_function_tags(
        &self,
        region: &str,
        function_arn: &str,
    ) -> BackendResult<BTreeMap<String, String>> {
        self.check("lambda-tags", region)?;
        Ok(self.function_tags.get(function_arn).cloned().unwrap_or_default())
    }

    async fn list_buckets(&self) -> BackendResult<Vec<Bucket>> {
        self.check("s3", "list")?;
        Ok(self.buckets.clone())
    }

    async fn bucket_location(&self, bucket: &str) -> BackendResult<Option<String>> {
        self.check("s3-location", bucket)?;
        Ok(self.bucket_locations.get(bucket).cloned())
    }

    async fn bucket_tags(&self, bucket: &str) -> BackendResult<Vec<Tag>> {
        self.check("s3-tagging", bucket)?;
        self.bucket_tags
            .get(bucket)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("NoSuchTagSet: {}", bucket)))
    }

    async fn describe_tags(&self, region: &str, resource_id: &str) -> BackendResult<Vec<Tag>> {
        self.check("tags", region)?;
        Ok(self.resource_tags.get(resource_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl MetricsBackend for FixtureBackend {
    async fn metric_statistics(
        &self,
        region: &str,
        query: &MetricQuery,
    ) -> BackendResult<Vec<Datapoint>> {
        self.check("cloudwatch", region)?;
        self.check("cloudwatch-metric", &query.metric_name)?;

        let resource_id = query.dimensions.first().map(|d| d.value.as_str());
        Ok(self
            .metrics
            .iter()
            .filter(|s| Some(s.resource_id.as_str()) == resource_id)
            .filter(|s| s.metric_name == query.metric_name)
            .flat_map(|s| s.datapoints.iter())
            .filter(|p| p.timestamp >= query.start_time && p.timestamp <= query.end_time)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BillingBackend for FixtureBackend {
    async fn cost_and_usage(&self, query: &CostQuery) -> BackendResult<CostResponse> {
        self.check("ce", "cost-and-usage")?;
        if query.filter.as_ref().is_some_and(mentions_resource_id) {
            return Err(BackendError::Status {
                code: 400,
                message: "RESOURCE_ID filters require the resource-level query".to_string(),
            });
        }
        Ok(self.evaluate(query))
    }

    async fn cost_and_usage_with_resources(
        &self,
        query: &CostQuery,
    ) -> BackendResult<CostResponse> {
        self.check("ce", "with-resources")?;
        let span = query.time_period.end - query.time_period.start;
        if span.num_days() > RESOURCE_COST_MAX_DAYS {
            return Err(BackendError::Status {
                code: 400,
                message: format!(
                    "resource-level cost window is limited to {} days",
                    RESOURCE_COST_MAX_DAYS
                ),
            });
        }
        Ok(self.evaluate(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(day: NaiveDate, service: &str, region: &str, amount: f64) -> CostEntry {
        CostEntry {
            date: day,
            service: service.to_string(),
            region: region.to_string(),
            resource_id: None,
            tags: BTreeMap::new(),
            amount,
        }
    }

    #[test]
    fn test_monthly_periods_clip_to_interval() {
        let interval = DateInterval {
            start: date(2024, 1, 20),
            end: date(2024, 3, 5),
        };
        let periods = FixtureBackend::periods(&interval, Granularity::Monthly);

        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0].end, date(2024, 2, 1));
        assert_eq!(periods[2].start, date(2024, 3, 1));
        assert_eq!(periods[2].end, date(2024, 3, 5));
    }

    #[tokio::test]
    async fn test_filtered_total_and_grouping() {
        let backend = FixtureBackend {
            costs: vec![
                entry(date(2024, 1, 2), "AWS Lambda", "us-east-1", 1.5),
                entry(date(2024, 1, 3), "AWS Lambda", "us-west-2", 2.0),
                entry(date(2024, 1, 3), "Amazon Simple Storage Service", "us-east-1", 4.0),
            ],
            ..Default::default()
        };

        let query = CostQuery::unblended(date(2024, 1, 1), date(2024, 1, 10), Granularity::Monthly)
            .with_filter(FilterExpression::And(vec![
                FilterExpression::dimension(CostDimension::Region, "us-east-1"),
                FilterExpression::dimension(CostDimension::Service, "AWS Lambda"),
            ]));
        let response = backend.cost_and_usage(&query).await.unwrap();
        assert_eq!(response.results_by_time[0].unblended_total(), Some(1.5));

        let grouped = CostQuery::unblended(date(2024, 1, 1), date(2024, 1, 10), Granularity::Monthly)
            .grouped_by(CostDimension::Region);
        let response = backend.cost_and_usage(&grouped).await.unwrap();
        let groups = &response.results_by_time[0].groups;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].keys, vec!["us-east-1".to_string()]);
        assert_eq!(groups[0].unblended(), Some(5.5));
    }

    #[tokio::test]
    async fn test_resource_filters_need_resource_query() {
        let backend = FixtureBackend::default();
        let query = CostQuery::unblended(date(2024, 1, 1), date(2024, 1, 31), Granularity::Monthly)
            .with_filter(FilterExpression::dimension(CostDimension::ResourceId, "i-1"));

        assert!(backend.cost_and_usage(&query).await.is_err());
        // 30 days exceeds the resource-level window
        assert!(backend.cost_and_usage_with_resources(&query).await.is_err());
    }

    #[tokio::test]
    async fn test_function_pagination() {
        let function = |name: &str| FunctionConfiguration {
            function_name: name.to_string(),
            function_arn: format!("arn:aws:lambda:us-east-1:1:function:{}", name),
            runtime: None,
            memory_size: None,
            timeout: None,
            handler: None,
            last_modified: None,
        };
        let backend = FixtureBackend {
            functions: BTreeMap::from([(
                "us-east-1".to_string(),
                vec![function("a"), function("b"), function("c")],
            )]),
            page_size: 2,
            ..Default::default()
        };

        let first = backend.list_functions("us-east-1", None).await.unwrap();
        assert_eq!(first.functions.len(), 2);
        let marker = first.next_marker.unwrap();

        let second = backend.list_functions("us-east-1", Some(&marker)).await.unwrap();
        assert_eq!(second.functions.len(), 1);
        assert!(second.next_marker.is_none());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = FixtureBackend::default().fail("rds", "us-west-2").fail("cloudwatch", "*");

        assert!(backend.describe_db_instances("us-west-2").await.is_err());
        assert!(backend.describe_db_instances("us-east-1").await.is_ok());
        assert!(backend.bucket_tags("missing").await.is_err());
    }

    #[test]
    fn test_fixture_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(
            &path,
            r#"{"regions": ["us-east-1"], "buckets": [{"Name": "logs", "CreationDate": "2023-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();

        let backend = FixtureBackend::from_path(&path).unwrap();
        assert_eq!(backend.regions, vec!["us-east-1".to_string()]);
        assert_eq!(backend.buckets[0].name, "logs");
        assert!(FixtureBackend::from_path(dir.path().join("missing.json")).is_err());
    }
}

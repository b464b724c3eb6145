//! Core data models for the inventory pipeline
//!
//! Every collector produces [`ResourceRecord`]s; the aggregator concatenates
//! them into a [`ResourceTable`]; the query engine filters that table with a
//! [`QueryPredicate`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical string format for every timestamp leaving a collector
pub const CANONICAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Region placeholder for resources whose home region could not be resolved
pub const GLOBAL_REGION: &str = "global";

/// Resource kind handled by one collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "EC2")]
    Compute,
    #[serde(rename = "RDS")]
    ManagedDb,
    #[serde(rename = "Lambda")]
    Function,
    #[serde(rename = "S3")]
    ObjectStore,
}

impl ServiceType {
    /// All kinds in collector declaration order
    pub const ALL: [ServiceType; 4] = [
        ServiceType::Compute,
        ServiceType::ManagedDb,
        ServiceType::Function,
        ServiceType::ObjectStore,
    ];

    /// Label used on the wire and by the query translator
    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::Compute => "EC2",
            ServiceType::ManagedDb => "RDS",
            ServiceType::Function => "Lambda",
            ServiceType::ObjectStore => "S3",
        }
    }

    /// Billing category this kind is charged under
    pub fn billing_category(&self) -> &'static str {
        match self {
            ServiceType::Compute => "Amazon Elastic Compute Cloud - Compute",
            ServiceType::ManagedDb => "Amazon Relational Database Service",
            ServiceType::Function => "AWS Lambda",
            ServiceType::ObjectStore => "Amazon Simple Storage Service",
        }
    }

    /// Exact, case-sensitive lookup by label
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    /// Reverse lookup from a billing category name
    pub fn from_billing_category(category: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.billing_category() == category)
    }

    /// Whether the kind is enumerated per region rather than globally
    pub fn is_regional(&self) -> bool {
        !matches!(self, ServiceType::ObjectStore)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One metric value nested under `details.metrics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub value: f64,
    pub unit: String,
}

impl MetricSample {
    /// Build a sample, rounding the value to two decimals
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value: (value * 100.0).round() / 100.0,
            unit: unit.into(),
        }
    }
}

/// Kind-specific attributes of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KindDetails {
    Compute {
        instance_type: String,
        private_ip: String,
        public_ip: String,
        vpc_id: String,
        subnet_id: String,
    },
    ManagedDb {
        engine: String,
        engine_version: String,
        instance_class: String,
        storage_gb: u32,
        endpoint: String,
    },
    Function {
        runtime: String,
        memory_mb: u32,
        timeout_secs: u32,
        handler: String,
    },
    ObjectStore {
        creation_date: String,
    },
}

/// Kind-specific attributes plus the metrics gathered during the pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDetails {
    #[serde(flatten)]
    pub attributes: KindDetails,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricSample>,
}

impl ResourceDetails {
    pub fn new(attributes: KindDetails, metrics: BTreeMap<String, MetricSample>) -> Self {
        Self {
            attributes,
            metrics,
        }
    }

    /// Value of a named metric, if it was collected
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|sample| sample.value)
    }
}

/// Unified record every collector produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub resource_id: String,
    pub service_type: ServiceType,
    pub region: String,
    pub status: String,
    #[serde(with = "canonical_time")]
    pub creation_date: DateTime<Utc>,
    #[serde(with = "canonical_time")]
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub cost: f64,
    pub details: ResourceDetails,
}

impl ResourceRecord {
    /// Status lower-cased for comparisons
    pub fn normalized_status(&self) -> String {
        self.status.to_lowercase()
    }

    /// Display name: the `Name` tag, else the first tag value
    pub fn display_tag(&self) -> Option<&str> {
        self.tags
            .get("Name")
            .or_else(|| self.tags.values().next())
            .map(String::as_str)
    }
}

/// Clamp a raw cost to a finite, non-negative amount
pub fn clamp_cost(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        0.0
    }
}

/// Format a timestamp in the canonical format
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(CANONICAL_TIME_FORMAT).to_string()
}

/// The unified table produced by one collection pass
///
/// Row order is collector declaration order, then native enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTable {
    rows: Vec<ResourceRecord>,
}

impl ResourceTable {
    pub fn new(rows: Vec<ResourceRecord>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ResourceRecord] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourceRecord> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<ResourceRecord> {
        self.rows
    }

    /// Append another kind's records after the current rows
    pub fn append(&mut self, mut records: Vec<ResourceRecord>) {
        self.rows.append(&mut records);
    }

    /// Rows of one resource kind
    pub fn of_kind(&self, kind: ServiceType) -> impl Iterator<Item = &ResourceRecord> {
        self.rows.iter().filter(move |r| r.service_type == kind)
    }

    /// Sum of all row costs
    pub fn total_cost(&self) -> f64 {
        self.rows.iter().map(|r| r.cost).sum()
    }

    /// Row count per resource kind
    pub fn count_by_kind(&self) -> BTreeMap<ServiceType, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.service_type).or_insert(0) += 1;
        }
        counts
    }
}

impl FromIterator<ResourceRecord> for ResourceTable {
    fn from_iter<I: IntoIterator<Item = ResourceRecord>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResourceTable {
    type Item = ResourceRecord;
    type IntoIter = std::vec::IntoIter<ResourceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResourceTable {
    type Item = &'a ResourceRecord;
    type IntoIter = std::slice::Iter<'a, ResourceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Service-type constraint as it arrives in a predicate
///
/// A label outside the known set is kept verbatim and matches no row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KindConstraint {
    Known(ServiceType),
    Unknown(String),
}

impl KindConstraint {
    /// Exact, case-sensitive match against a row's kind
    pub fn matches(&self, kind: ServiceType) -> bool {
        match self {
            KindConstraint::Known(wanted) => *wanted == kind,
            KindConstraint::Unknown(_) => false,
        }
    }
}

impl From<ServiceType> for KindConstraint {
    fn from(kind: ServiceType) -> Self {
        KindConstraint::Known(kind)
    }
}

/// Structured filter derived from a free-text question
///
/// `None` means "no constraint on this field"; `Some("")` is a constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPredicate {
    #[serde(default)]
    pub service_type: Option<KindConstraint>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl QueryPredicate {
    /// True when no field constrains the table
    pub fn is_unconstrained(&self) -> bool {
        self.service_type.is_none() && self.region.is_none() && self.status.is_none()
    }
}

/// Serde adapter writing timestamps in [`CANONICAL_TIME_FORMAT`]
pub mod canonical_time {
    use super::CANONICAL_TIME_FORMAT;
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(CANONICAL_TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, CANONICAL_TIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> ResourceRecord {
        ResourceRecord {
            resource_id: "i-1".to_string(),
            service_type: ServiceType::Compute,
            region: "us-east-1".to_string(),
            status: "Running".to_string(),
            creation_date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            last_modified: Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap(),
            tags: BTreeMap::from([("Name".to_string(), "web".to_string())]),
            cost: 10.0,
            details: ResourceDetails::new(
                KindDetails::Compute {
                    instance_type: "t3.micro".to_string(),
                    private_ip: "10.0.0.1".to_string(),
                    public_ip: String::new(),
                    vpc_id: "vpc-1".to_string(),
                    subnet_id: "subnet-1".to_string(),
                },
                BTreeMap::from([("CPUUtilization".to_string(), MetricSample::new(12.345, "Percent"))]),
            ),
        }
    }

    #[test]
    fn test_service_type_labels_are_exact() {
        assert_eq!(ServiceType::from_label("EC2"), Some(ServiceType::Compute));
        assert_eq!(ServiceType::from_label("Lambda"), Some(ServiceType::Function));
        assert_eq!(ServiceType::from_label("ec2"), None);
        assert_eq!(
            ServiceType::from_billing_category("AWS Lambda"),
            Some(ServiceType::Function)
        );
        assert!(!ServiceType::ObjectStore.is_regional());
    }

    #[test]
    fn test_metric_sample_rounds_to_two_decimals() {
        let sample = MetricSample::new(12.345678, "Percent");
        assert_eq!(sample.value, 12.35);
    }

    #[test]
    fn test_clamp_cost() {
        assert_eq!(clamp_cost(12.5), 12.5);
        assert_eq!(clamp_cost(-3.0), 0.0);
        assert_eq!(clamp_cost(f64::NAN), 0.0);
        assert_eq!(clamp_cost(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_record_serializes_canonical_shape() {
        let json = serde_json::to_value(sample_record()).unwrap();

        assert_eq!(json["service_type"], "EC2");
        assert_eq!(json["creation_date"], "2024-03-01 12:30:00");
        assert_eq!(json["details"]["kind"], "compute");
        assert_eq!(json["details"]["instance_type"], "t3.micro");
        assert_eq!(json["details"]["metrics"]["CPUUtilization"]["value"], 12.35);

        let back: ResourceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_record());
    }

    #[test]
    fn test_display_tag_prefers_name() {
        let mut record = sample_record();
        assert_eq!(record.display_tag(), Some("web"));

        record.tags = BTreeMap::from([("team".to_string(), "core".to_string())]);
        assert_eq!(record.display_tag(), Some("core"));

        record.tags.clear();
        assert_eq!(record.display_tag(), None);
    }

    #[test]
    fn test_predicate_parses_nulls_as_unconstrained() {
        let predicate: QueryPredicate =
            serde_json::from_str(r#"{"service_type": null, "region": null, "status": null}"#)
                .unwrap();
        assert!(predicate.is_unconstrained());

        let predicate: QueryPredicate = serde_json::from_str(r#"{"region": ""}"#).unwrap();
        assert_eq!(predicate.region.as_deref(), Some(""));
        assert!(!predicate.is_unconstrained());
    }

    #[test]
    fn test_unknown_kind_label_stays_a_constraint() {
        let predicate: QueryPredicate = serde_json::from_str(
            r#"{"service_type": "ec2", "region": "us-east-1", "status": "running"}"#,
        )
        .unwrap();

        let kind = predicate.service_type.as_ref().unwrap();
        assert_eq!(kind, &KindConstraint::Unknown("ec2".to_string()));
        assert!(!kind.matches(ServiceType::Compute));
        assert_eq!(predicate.region.as_deref(), Some("us-east-1"));
        assert_eq!(predicate.status.as_deref(), Some("running"));

        let predicate: QueryPredicate =
            serde_json::from_str(r#"{"service_type": "EC2"}"#).unwrap();
        assert_eq!(predicate.service_type, Some(ServiceType::Compute.into()));
        assert_eq!(
            serde_json::to_value(&predicate).unwrap()["service_type"],
            "EC2"
        );
    }

    #[test]
    fn test_table_counts_by_kind() {
        let table: ResourceTable = vec![sample_record(), sample_record()].into_iter().collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.count_by_kind()[&ServiceType::Compute], 2);
        assert_eq!(table.total_cost(), 20.0);
    }
}

//! Rule-based optimization recommendations over the unified table

use crate::models::{ResourceTable, ServiceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compute instances below this average CPU are downsizing candidates
pub const LOW_CPU_PERCENT: f64 = 20.0;

/// Databases below this connection count are downsizing candidates
pub const LOW_DB_CONNECTIONS: f64 = 5.0;

const COMPUTE_DOWNSIZE_SAVINGS: f64 = 0.5;
const DATABASE_DOWNSIZE_SAVINGS: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationType {
    Downsizing,
    Termination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub resource_id: String,
    pub service_type: ServiceType,
    pub tags: BTreeMap<String, String>,
    pub recommendation_type: RecommendationType,
    pub reason: String,
    pub potential_savings: f64,
    pub action: String,
}

/// Recommendations for every resource matching a rule
///
/// A stopped, idle instance gets both a downsizing and a termination entry.
pub fn recommend(table: &ResourceTable) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    for record in table.of_kind(ServiceType::Compute) {
        if let Some(cpu) = record.details.metric("CPUUtilization") {
            if cpu < LOW_CPU_PERCENT {
                recommendations.push(Recommendation {
                    resource_id: record.resource_id.clone(),
                    service_type: ServiceType::Compute,
                    tags: record.tags.clone(),
                    recommendation_type: RecommendationType::Downsizing,
                    reason: format!("Low CPU utilization ({}%)", cpu),
                    potential_savings: record.cost * COMPUTE_DOWNSIZE_SAVINGS,
                    action: "Consider using a smaller instance type".to_string(),
                });
            }
        }

        if record.normalized_status() == "stopped" {
            recommendations.push(Recommendation {
                resource_id: record.resource_id.clone(),
                service_type: ServiceType::Compute,
                tags: record.tags.clone(),
                recommendation_type: RecommendationType::Termination,
                reason: "Instance is stopped".to_string(),
                potential_savings: record.cost,
                action: "Consider terminating if not needed".to_string(),
            });
        }
    }

    for record in table.of_kind(ServiceType::ManagedDb) {
        if let Some(connections) = record.details.metric("DatabaseConnections") {
            if connections < LOW_DB_CONNECTIONS {
                recommendations.push(Recommendation {
                    resource_id: record.resource_id.clone(),
                    service_type: ServiceType::ManagedDb,
                    tags: record.tags.clone(),
                    recommendation_type: RecommendationType::Downsizing,
                    reason: format!("Low number of connections ({})", connections),
                    potential_savings: record.cost * DATABASE_DOWNSIZE_SAVINGS,
                    action: "Consider using a smaller instance class".to_string(),
                });
            }
        }
    }

    recommendations
}

pub fn total_savings(recommendations: &[Recommendation]) -> f64 {
    recommendations.iter().map(|r| r.potential_savings).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KindDetails, MetricSample, ResourceDetails, ResourceRecord};
    use chrono::Utc;

    fn record(id: &str, kind: ServiceType, status: &str, cost: f64, metric: Option<(&str, f64)>) -> ResourceRecord {
        let attributes = match kind {
            ServiceType::ManagedDb => KindDetails::ManagedDb {
                engine: "mysql".to_string(),
                engine_version: "8.0".to_string(),
                instance_class: "db.m5.large".to_string(),
                storage_gb: 20,
                endpoint: String::new(),
            },
            _ => KindDetails::Compute {
                instance_type: "m5.large".to_string(),
                private_ip: String::new(),
                public_ip: String::new(),
                vpc_id: String::new(),
                subnet_id: String::new(),
            },
        };
        let metrics = metric
            .map(|(name, value)| BTreeMap::from([(name.to_string(), MetricSample::new(value, "Percent"))]))
            .unwrap_or_default();

        ResourceRecord {
            resource_id: id.to_string(),
            service_type: kind,
            region: "us-east-1".to_string(),
            status: status.to_string(),
            creation_date: Utc::now(),
            last_modified: Utc::now(),
            tags: BTreeMap::new(),
            cost,
            details: ResourceDetails::new(attributes, metrics),
        }
    }

    #[test]
    fn test_rules() {
        let table = ResourceTable::new(vec![
            record("i-idle", ServiceType::Compute, "running", 100.0, Some(("CPUUtilization", 3.5))),
            record("i-busy", ServiceType::Compute, "running", 100.0, Some(("CPUUtilization", 85.0))),
            record("i-off", ServiceType::Compute, "stopped", 40.0, None),
            record("db-quiet", ServiceType::ManagedDb, "available", 50.0, Some(("DatabaseConnections", 1.0))),
            record("db-busy", ServiceType::ManagedDb, "available", 50.0, Some(("DatabaseConnections", 120.0))),
        ]);

        let recommendations = recommend(&table);
        let summary: Vec<(&str, RecommendationType, f64)> = recommendations
            .iter()
            .map(|r| (r.resource_id.as_str(), r.recommendation_type, r.potential_savings))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("i-idle", RecommendationType::Downsizing, 50.0),
                ("i-off", RecommendationType::Termination, 40.0),
                ("db-quiet", RecommendationType::Downsizing, 20.0),
            ]
        );
        assert_eq!(recommendations[0].reason, "Low CPU utilization (3.5%)");
        assert_eq!(total_savings(&recommendations), 110.0);
    }

    #[test]
    fn test_missing_metrics_produce_nothing() {
        let table = ResourceTable::new(vec![record("i-new", ServiceType::Compute, "running", 10.0, None)]);
        assert!(recommend(&table).is_empty());
        assert_eq!(total_savings(&[]), 0.0);
    }
}

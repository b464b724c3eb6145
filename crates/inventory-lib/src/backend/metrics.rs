//! Monitoring backend

use super::BackendResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics query against the monitoring backend
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    async fn metric_statistics(
        &self,
        region: &str,
        query: &MetricQuery,
    ) -> BackendResult<Vec<Datapoint>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Average,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricDimension {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<MetricDimension>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Aggregation period in seconds
    pub period: u32,
    pub statistics: Vec<Statistic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl Datapoint {
    /// The most recent datapoint that carries an average
    pub fn latest(points: &[Datapoint]) -> Option<&Datapoint> {
        points
            .iter()
            .filter(|p| p.average.is_some())
            .max_by_key(|p| p.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(hour: u32, average: Option<f64>) -> Datapoint {
        Datapoint {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            average,
            unit: Some("Percent".to_string()),
        }
    }

    #[test]
    fn test_latest_ignores_backend_order() {
        let points = vec![point(3, Some(30.0)), point(5, Some(50.0)), point(4, Some(40.0))];
        assert_eq!(Datapoint::latest(&points).unwrap().average, Some(50.0));
    }

    #[test]
    fn test_latest_skips_points_without_average() {
        let points = vec![point(3, Some(30.0)), point(6, None)];
        assert_eq!(Datapoint::latest(&points).unwrap().average, Some(30.0));
        assert!(Datapoint::latest(&[]).is_none());
    }
}

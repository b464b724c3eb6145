//! HTTP client for the inventory gateway
//!
//! The gateway fronts the provider's enumeration, monitoring and billing APIs
//! and speaks their native JSON shapes. One route per native operation.

use super::billing::{BillingBackend, CostQuery, CostResponse};
use super::inventory::{Bucket, DbInstance, FunctionPage, InventoryBackend, Reservation, Tag};
use super::metrics::{Datapoint, MetricQuery, MetricsBackend};
use super::{BackendResult, DEFAULT_CALL_TIMEOUT};
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Configuration for the gateway client
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://inventory-gateway:8090/`
    pub endpoint: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://inventory-gateway:8090/".to_string(),
            request_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// JSON client implementing every cloud-facing backend trait
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    /// Create a new gateway client
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        // A trailing slash keeps `join` from dropping the last path segment
        let mut endpoint = config.endpoint.clone();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let base_url = Url::parse(&endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid gateway URL {}: {}", endpoint, e))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> BackendResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| BackendError::Decode(format!("invalid path {}: {}", path, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> BackendResult<T> {
        let url = self.url(path, query)?;
        debug!(url = %url, "Gateway GET");
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> BackendResult<T> {
        let url = self.url(path, &[])?;
        debug!(url = %url, "Gateway POST");
        let response = self.client.post(url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(BackendError::from);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => BackendError::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => BackendError::Throttled(body),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
                BackendError::Unavailable(body)
            }
            _ => BackendError::Status {
                code: status.as_u16(),
                message: body,
            },
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegionsResponse {
    regions: Vec<RegionEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegionEntry {
    region_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReservationsResponse {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
struct DbInstancesResponse {
    #[serde(rename = "DBInstances", default)]
    db_instances: Vec<DbInstance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionTagsResponse {
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketsResponse {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LocationResponse {
    #[serde(default)]
    location_constraint: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TagSetResponse {
    #[serde(default)]
    tag_set: Vec<Tag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TagsResponse {
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DatapointsResponse {
    #[serde(default)]
    datapoints: Vec<Datapoint>,
}

#[async_trait]
impl InventoryBackend for HttpGateway {
    async fn list_regions(&self) -> BackendResult<Vec<String>> {
        let response: RegionsResponse = self.get("v1/regions", &[]).await?;
        Ok(response.regions.into_iter().map(|r| r.region_name).collect())
    }

    async fn describe_instances(&self, region: &str) -> BackendResult<Vec<Reservation>> {
        let response: ReservationsResponse =
            self.get(&format!("v1/{}/ec2/instances", region), &[]).await?;
        Ok(response.reservations)
    }

    async fn describe_db_instances(&self, region: &str) -> BackendResult<Vec<DbInstance>> {
        let response: DbInstancesResponse =
            self.get(&format!("v1/{}/rds/instances", region), &[]).await?;
        Ok(response.db_instances)
    }

    async fn list_functions(
        &self,
        region: &str,
        marker: Option<&str>,
    ) -> BackendResult<FunctionPage> {
        let path = format!("v1/{}/lambda/functions", region);
        match marker {
            Some(marker) => self.get(&path, &[("marker", marker)]).await,
            None => self.get(&path, &[]).await,
        }
    }

    async fn list_function_tags(
        &self,
        region: &str,
        function_arn: &str,
    ) -> BackendResult<BTreeMap<String, String>> {
        let response: FunctionTagsResponse = self
            .get(&format!("v1/{}/lambda/tags", region), &[("arn", function_arn)])
            .await?;
        Ok(response.tags)
    }

    async fn list_buckets(&self) -> BackendResult<Vec<Bucket>> {
        let response: BucketsResponse = self.get("v1/s3/buckets", &[]).await?;
        Ok(response.buckets)
    }

    async fn bucket_location(&self, bucket: &str) -> BackendResult<Option<String>> {
        let response: LocationResponse = self
            .get(&format!("v1/s3/buckets/{}/location", bucket), &[])
            .await?;
        Ok(response.location_constraint.filter(|l| !l.is_empty()))
    }

    async fn bucket_tags(&self, bucket: &str) -> BackendResult<Vec<Tag>> {
        let response: TagSetResponse = self
            .get(&format!("v1/s3/buckets/{}/tagging", bucket), &[])
            .await?;
        Ok(response.tag_set)
    }

    async fn describe_tags(&self, region: &str, resource_id: &str) -> BackendResult<Vec<Tag>> {
        let response: TagsResponse = self
            .get(&format!("v1/{}/ec2/tags", region), &[("resource_id", resource_id)])
            .await?;
        Ok(response.tags)
    }
}

#[async_trait]
impl MetricsBackend for HttpGateway {
    async fn metric_statistics(
        &self,
        region: &str,
        query: &MetricQuery,
    ) -> BackendResult<Vec<Datapoint>> {
        let response: DatapointsResponse = self
            .post(&format!("v1/{}/cloudwatch/statistics", region), query)
            .await?;
        Ok(response.datapoints)
    }
}

#[async_trait]
impl BillingBackend for HttpGateway {
    async fn cost_and_usage(&self, query: &CostQuery) -> BackendResult<CostResponse> {
        self.post("v1/ce/cost-and-usage", query).await
    }

    async fn cost_and_usage_with_resources(
        &self,
        query: &CostQuery,
    ) -> BackendResult<CostResponse> {
        self.post("v1/ce/cost-and-usage-with-resources", query).await
    }
}

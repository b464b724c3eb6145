//! Resource enumeration backend and its native payload shapes

use super::BackendResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only enumeration of native resources
#[async_trait]
pub trait InventoryBackend: Send + Sync {
    /// Regions enabled for the account
    async fn list_regions(&self) -> BackendResult<Vec<String>>;

    /// Compute instances in one region, grouped by reservation
    async fn describe_instances(&self, region: &str) -> BackendResult<Vec<Reservation>>;

    /// Managed database instances in one region
    async fn describe_db_instances(&self, region: &str) -> BackendResult<Vec<DbInstance>>;

    /// One page of functions in a region; pass the previous `next_marker` to continue
    async fn list_functions(&self, region: &str, marker: Option<&str>)
        -> BackendResult<FunctionPage>;

    /// Tags attached to a function
    async fn list_function_tags(
        &self,
        region: &str,
        function_arn: &str,
    ) -> BackendResult<BTreeMap<String, String>>;

    /// All buckets in the account (region-less)
    async fn list_buckets(&self) -> BackendResult<Vec<Bucket>>;

    /// Location constraint of a bucket; `None` means the default region
    async fn bucket_location(&self, bucket: &str) -> BackendResult<Option<String>>;

    /// Tag set of a bucket
    async fn bucket_tags(&self, bucket: &str) -> BackendResult<Vec<Tag>>;

    /// Tags attached to any resource id in a region
    async fn describe_tags(&self, region: &str, resource_id: &str) -> BackendResult<Vec<Tag>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Flatten a native tag list into a key/value mapping
pub fn tags_to_map(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|tag| (tag.key.clone(), tag.value.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reservation {
    #[serde(default)]
    pub instances: Vec<Instance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instance {
    pub instance_id: String,
    pub instance_type: String,
    pub state: InstanceState,
    pub launch_time: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub private_ip_address: Option<String>,
    #[serde(default)]
    pub public_ip_address: Option<String>,
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceState {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbInstance {
    #[serde(rename = "DBInstanceIdentifier")]
    pub db_instance_identifier: String,
    #[serde(rename = "DBInstanceStatus")]
    pub db_instance_status: String,
    #[serde(default)]
    pub instance_create_time: Option<String>,
    pub engine: String,
    #[serde(default)]
    pub engine_version: String,
    #[serde(rename = "DBInstanceClass")]
    pub db_instance_class: String,
    #[serde(default)]
    pub allocated_storage: u32,
    #[serde(default)]
    pub endpoint: Option<DbEndpoint>,
    #[serde(default)]
    pub tag_list: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbEndpoint {
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionConfiguration {
    pub function_name: String,
    pub function_arn: String,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub memory_size: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionPage {
    #[serde(default)]
    pub functions: Vec<FunctionConfiguration>,
    #[serde(default)]
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bucket {
    pub name: String,
    pub creation_date: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_parses_native_shape() {
        let raw = r#"{
            "Instances": [{
                "InstanceId": "i-0abc",
                "InstanceType": "t3.small",
                "State": {"Name": "running"},
                "LaunchTime": "2024-01-15T09:30:00Z",
                "Tags": [{"Key": "Name", "Value": "api"}]
            }]
        }"#;

        let reservation: Reservation = serde_json::from_str(raw).unwrap();
        let instance = &reservation.instances[0];
        assert_eq!(instance.instance_id, "i-0abc");
        assert_eq!(instance.state.name, "running");
        assert!(instance.public_ip_address.is_none());
        assert_eq!(tags_to_map(&instance.tags)["Name"], "api");
    }

    #[test]
    fn test_db_instance_parses_uppercase_acronyms() {
        let raw = r#"{
            "DBInstanceIdentifier": "orders-db",
            "DBInstanceStatus": "available",
            "InstanceCreateTime": "2023-06-01T00:00:00Z",
            "Engine": "postgres",
            "EngineVersion": "15.4",
            "DBInstanceClass": "db.t3.medium",
            "AllocatedStorage": 100,
            "Endpoint": {"Address": "orders.example.internal"}
        }"#;

        let db: DbInstance = serde_json::from_str(raw).unwrap();
        assert_eq!(db.db_instance_identifier, "orders-db");
        assert_eq!(db.db_instance_class, "db.t3.medium");
        assert!(db.tag_list.is_empty());
    }
}

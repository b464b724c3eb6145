//! Managed database collector

use super::{async_trait, parse_timestamp, CollectorContext, ResourceCollector};
use crate::backend::{tags_to_map, DbInstance};
use crate::models::{KindDetails, ResourceDetails, ResourceRecord, ServiceType};
use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::debug;

pub struct DatabaseCollector {
    context: CollectorContext,
}

impl DatabaseCollector {
    pub fn new(context: CollectorContext) -> Self {
        Self { context }
    }

    async fn assemble(&self, region: &str, instance: DbInstance) -> Result<ResourceRecord> {
        let now = Utc::now();
        // Instances still being created have no creation time yet
        let creation_date = match instance.instance_create_time.as_deref() {
            Some(raw) => parse_timestamp(raw).ok_or_else(|| {
                anyhow!(
                    "database {} has malformed creation time {:?}",
                    instance.db_instance_identifier,
                    raw
                )
            })?,
            None => now,
        };

        let id = &instance.db_instance_identifier;
        let metrics = self.context.metrics.fetch(id, ServiceType::ManagedDb, region).await;
        let cost = self.context.costs.fetch(id, ServiceType::ManagedDb, region).await;

        Ok(ResourceRecord {
            resource_id: instance.db_instance_identifier,
            service_type: ServiceType::ManagedDb,
            region: region.to_string(),
            status: instance.db_instance_status.to_lowercase(),
            creation_date,
            last_modified: now,
            tags: tags_to_map(&instance.tag_list),
            cost,
            details: ResourceDetails::new(
                KindDetails::ManagedDb {
                    engine: instance.engine,
                    engine_version: instance.engine_version,
                    instance_class: instance.db_instance_class,
                    storage_gb: instance.allocated_storage,
                    endpoint: instance
                        .endpoint
                        .and_then(|e| e.address)
                        .unwrap_or_default(),
                },
                metrics,
            ),
        })
    }
}

#[async_trait]
impl ResourceCollector for DatabaseCollector {
    fn service_type(&self) -> ServiceType {
        ServiceType::ManagedDb
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();

        for region in self.context.regions.iter() {
            let Some(instances) = self
                .context
                .enumerate(
                    ServiceType::ManagedDb,
                    region,
                    self.context.inventory.describe_db_instances(region),
                )
                .await
            else {
                continue;
            };
            debug!(region = %region, count = instances.len(), "Enumerated database instances");

            let assembled = self
                .context
                .assemble_all(ServiceType::ManagedDb, instances, |instance| {
                    self.assemble(region, instance)
                })
                .await;
            records.extend(assembled);
        }

        Ok(records)
    }
}

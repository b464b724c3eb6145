//! Compute instance collector

use super::{async_trait, parse_timestamp, CollectorContext, ResourceCollector};
use crate::backend::{tags_to_map, Instance};
use crate::models::{KindDetails, ResourceDetails, ResourceRecord, ServiceType};
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

pub struct ComputeCollector {
    context: CollectorContext,
}

impl ComputeCollector {
    pub fn new(context: CollectorContext) -> Self {
        Self { context }
    }

    async fn assemble(&self, region: &str, instance: Instance) -> Result<ResourceRecord> {
        let creation_date = parse_timestamp(&instance.launch_time).with_context(|| {
            format!(
                "instance {} has malformed launch time {:?}",
                instance.instance_id, instance.launch_time
            )
        })?;

        let metrics = self
            .context
            .metrics
            .fetch(&instance.instance_id, ServiceType::Compute, region)
            .await;
        let cost = self
            .context
            .costs
            .fetch(&instance.instance_id, ServiceType::Compute, region)
            .await;

        Ok(ResourceRecord {
            resource_id: instance.instance_id,
            service_type: ServiceType::Compute,
            region: region.to_string(),
            status: instance.state.name.to_lowercase(),
            creation_date,
            last_modified: Utc::now(),
            tags: tags_to_map(&instance.tags),
            cost,
            details: ResourceDetails::new(
                KindDetails::Compute {
                    instance_type: instance.instance_type,
                    private_ip: instance.private_ip_address.unwrap_or_default(),
                    public_ip: instance.public_ip_address.unwrap_or_default(),
                    vpc_id: instance.vpc_id.unwrap_or_default(),
                    subnet_id: instance.subnet_id.unwrap_or_default(),
                },
                metrics,
            ),
        })
    }
}

#[async_trait]
impl ResourceCollector for ComputeCollector {
    fn service_type(&self) -> ServiceType {
        ServiceType::Compute
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();

        for region in self.context.regions.iter() {
            let Some(reservations) = self
                .context
                .enumerate(
                    ServiceType::Compute,
                    region,
                    self.context.inventory.describe_instances(region),
                )
                .await
            else {
                continue;
            };

            let instances: Vec<Instance> = reservations
                .into_iter()
                .flat_map(|reservation| reservation.instances)
                .collect();
            debug!(region = %region, count = instances.len(), "Enumerated instances");

            let assembled = self
                .context
                .assemble_all(ServiceType::Compute, instances, |instance| {
                    self.assemble(region, instance)
                })
                .await;
            records.extend(assembled);
        }

        Ok(records)
    }
}

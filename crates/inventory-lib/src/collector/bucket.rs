//! Object-storage bucket collector
//!
//! Buckets are enumerated once globally; each bucket's home region comes
//! from its location constraint.

use super::{async_trait, parse_timestamp, CollectorContext, ResourceCollector};
use crate::backend::{bounded, tags_to_map, Bucket};
use crate::error::BackendError;
use crate::models::{
    format_timestamp, KindDetails, ResourceDetails, ResourceRecord, ServiceType, GLOBAL_REGION,
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

/// Region of buckets with an empty location constraint
const DEFAULT_BUCKET_REGION: &str = "us-east-1";

const BUCKET_STATUS: &str = "active";

pub struct BucketCollector {
    context: CollectorContext,
}

impl BucketCollector {
    pub fn new(context: CollectorContext) -> Self {
        Self { context }
    }

    async fn region_of(&self, bucket: &str) -> String {
        match bounded(
            self.context.config.call_timeout,
            self.context.inventory.bucket_location(bucket),
        )
        .await
        {
            Ok(Some(location)) => location,
            Ok(None) => DEFAULT_BUCKET_REGION.to_string(),
            Err(e) => {
                debug!(bucket = %bucket, error = %e, "Bucket location unavailable");
                GLOBAL_REGION.to_string()
            }
        }
    }

    async fn tags_of(&self, bucket: &str) -> BTreeMap<String, String> {
        match bounded(
            self.context.config.call_timeout,
            self.context.inventory.bucket_tags(bucket),
        )
        .await
        {
            Ok(tags) => tags_to_map(&tags),
            // Untagged buckets report a missing tag set
            Err(BackendError::NotFound(_)) => BTreeMap::new(),
            Err(e) => {
                debug!(bucket = %bucket, error = %e, "Bucket tags unavailable");
                BTreeMap::new()
            }
        }
    }

    async fn assemble(&self, bucket: Bucket) -> Result<ResourceRecord> {
        let creation_date = parse_timestamp(&bucket.creation_date).with_context(|| {
            format!(
                "bucket {} has malformed creation date {:?}",
                bucket.name, bucket.creation_date
            )
        })?;

        let region = self.region_of(&bucket.name).await;
        let tags = self.tags_of(&bucket.name).await;
        let metrics = self
            .context
            .metrics
            .fetch(&bucket.name, ServiceType::ObjectStore, &region)
            .await;
        let cost = self
            .context
            .costs
            .fetch(&bucket.name, ServiceType::ObjectStore, &region)
            .await;

        Ok(ResourceRecord {
            resource_id: bucket.name,
            service_type: ServiceType::ObjectStore,
            region,
            status: BUCKET_STATUS.to_string(),
            creation_date,
            last_modified: Utc::now(),
            tags,
            cost,
            details: ResourceDetails::new(
                KindDetails::ObjectStore {
                    creation_date: format_timestamp(&creation_date),
                },
                metrics,
            ),
        })
    }
}

#[async_trait]
impl ResourceCollector for BucketCollector {
    fn service_type(&self) -> ServiceType {
        ServiceType::ObjectStore
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let Some(buckets) = self
            .context
            .enumerate(
                ServiceType::ObjectStore,
                "global",
                self.context.inventory.list_buckets(),
            )
            .await
        else {
            return Ok(Vec::new());
        };
        debug!(count = buckets.len(), "Enumerated buckets");

        Ok(self
            .context
            .assemble_all(ServiceType::ObjectStore, buckets, |bucket| self.assemble(bucket))
            .await)
    }
}

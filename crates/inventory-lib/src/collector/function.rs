//! Serverless function collector

use super::{async_trait, parse_timestamp, CollectorContext, ResourceCollector};
use crate::backend::{bounded, FunctionConfiguration};
use crate::models::{KindDetails, ResourceDetails, ResourceRecord, ServiceType};
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

/// Status reported for every enumerated function
const FUNCTION_STATUS: &str = "active";

pub struct FunctionCollector {
    context: CollectorContext,
}

impl FunctionCollector {
    pub fn new(context: CollectorContext) -> Self {
        Self { context }
    }

    /// Every function in a region, following pagination markers
    ///
    /// A failing page keeps what earlier pages returned.
    async fn list_all(&self, region: &str) -> Option<Vec<FunctionConfiguration>> {
        let mut functions = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .context
                .enumerate(
                    ServiceType::Function,
                    region,
                    self.context.inventory.list_functions(region, marker.as_deref()),
                )
                .await;

            let Some(page) = page else {
                return if functions.is_empty() { None } else { Some(functions) };
            };

            functions.extend(page.functions);
            match page.next_marker {
                Some(next) if Some(&next) != marker.as_ref() => marker = Some(next),
                _ => return Some(functions),
            }
        }
    }

    async fn assemble(&self, region: &str, function: FunctionConfiguration) -> Result<ResourceRecord> {
        let tags = bounded(
            self.context.config.call_timeout,
            self.context
                .inventory
                .list_function_tags(region, &function.function_arn),
        )
        .await
        .with_context(|| format!("failed to list tags for function {}", function.function_name))?;

        let modified = function
            .last_modified
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        let name = &function.function_name;
        let metrics = self.context.metrics.fetch(name, ServiceType::Function, region).await;
        let cost = self.context.costs.fetch(name, ServiceType::Function, region).await;

        Ok(ResourceRecord {
            resource_id: function.function_name,
            service_type: ServiceType::Function,
            region: region.to_string(),
            status: FUNCTION_STATUS.to_string(),
            creation_date: modified,
            last_modified: modified,
            tags,
            cost,
            details: ResourceDetails::new(
                KindDetails::Function {
                    runtime: function.runtime.unwrap_or_default(),
                    memory_mb: function.memory_size.unwrap_or_default(),
                    timeout_secs: function.timeout.unwrap_or_default(),
                    handler: function.handler.unwrap_or_default(),
                },
                metrics,
            ),
        })
    }
}

#[async_trait]
impl ResourceCollector for FunctionCollector {
    fn service_type(&self) -> ServiceType {
        ServiceType::Function
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();

        for region in self.context.regions.iter() {
            let Some(functions) = self.list_all(region).await else {
                continue;
            };
            debug!(region = %region, count = functions.len(), "Enumerated functions");

            let assembled = self
                .context
                .assemble_all(ServiceType::Function, functions, |function| {
                    self.assemble(region, function)
                })
                .await;
            records.extend(assembled);
        }

        Ok(records)
    }
}

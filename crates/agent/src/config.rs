//! Agent configuration

use anyhow::Result;
use inventory_lib::backend::{GatewayConfig, MessagesConfig, DEFAULT_CALL_TIMEOUT};
use inventory_lib::collector::CollectionConfig;
use inventory_lib::fetcher::CostStrategy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration, read from `INVENTORY_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    /// Instance name attached to structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Inventory gateway serving the cloud APIs
    #[serde(default = "default_gateway_endpoint")]
    pub gateway_endpoint: String,

    /// Text-generation endpoint
    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,

    /// Empty disables text generation; translation then always degrades
    #[serde(default)]
    pub llm_api_key: String,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Comma-separated regions; empty means discover them
    #[serde(default)]
    pub regions: String,

    /// Collection interval, also the cache TTL
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    #[serde(default = "default_per_resource_concurrency")]
    pub per_resource_concurrency: usize,

    #[serde(default)]
    pub cost_strategy: CostStrategy,

    /// Serve a JSON snapshot instead of the gateway
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "inventory-agent".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_gateway_endpoint() -> String {
    GatewayConfig::default().endpoint
}

fn default_llm_endpoint() -> String {
    MessagesConfig::default().endpoint
}

fn default_llm_model() -> String {
    MessagesConfig::default().model
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_call_timeout() -> u64 {
    DEFAULT_CALL_TIMEOUT.as_secs()
}

fn default_per_resource_concurrency() -> usize {
    1
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            gateway_endpoint: default_gateway_endpoint(),
            llm_endpoint: default_llm_endpoint(),
            llm_api_key: String::new(),
            llm_model: default_llm_model(),
            regions: String::new(),
            refresh_interval_secs: default_refresh_interval(),
            call_timeout_secs: default_call_timeout(),
            per_resource_concurrency: default_per_resource_concurrency(),
            cost_strategy: CostStrategy::default(),
            fixture_path: None,
        }
    }
}

impl InventoryConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("INVENTORY"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid configuration, using defaults");
            InventoryConfig::default()
        }))
    }

    /// Configured regions, or `None` when they should be discovered
    pub fn region_list(&self) -> Option<Vec<String>> {
        let regions: Vec<String> = self
            .regions
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();
        (!regions.is_empty()).then_some(regions)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn collection(&self) -> CollectionConfig {
        CollectionConfig {
            call_timeout: self.call_timeout(),
            per_resource_concurrency: self.per_resource_concurrency.max(1),
        }
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            endpoint: self.gateway_endpoint.clone(),
            request_timeout: self.call_timeout(),
        }
    }

    pub fn messages(&self) -> MessagesConfig {
        MessagesConfig {
            endpoint: self.llm_endpoint.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            ..MessagesConfig::default()
        }
    }
}

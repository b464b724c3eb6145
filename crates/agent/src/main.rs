//! Inventory Agent - cloud resource inventory service
//!
//! Collects compute, database, function and bucket resources across regions
//! on a fixed interval and serves the unified table over HTTP.

use anyhow::Result;
use inventory_agent::{
    api,
    config::InventoryConfig,
    service::{Backends, InventoryService},
};
use inventory_lib::{
    health::{components, HealthRegistry},
    observability::{InventoryMetrics, StructuredLogger},
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting inventory-agent");

    let config = InventoryConfig::load()?;
    info!(instance = %config.instance_name, "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::BILLING).await;
    health_registry.register(components::TRANSLATOR).await;

    let metrics = InventoryMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);

    let backends = Backends::from_config(&config)?;
    let (service, regions) =
        InventoryService::build(&config, backends, health_registry.clone(), logger.clone()).await;
    logger.log_startup(AGENT_VERSION, &regions);

    let service = Arc::new(service);
    let app_state = Arc::new(api::AppState::new(service.clone(), metrics));

    // Readiness flips once the first pass lands in the cache
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let refresh_handle = tokio::spawn(service.clone().run_refresh_loop(async move {
        let _ = stop_rx.await;
    }));

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task aborted"),
                Ok(Ok(())) => {}
            }
            logger.log_shutdown("API server stopped");
        }
    }

    let _ = stop_tx.send(());
    let _ = refresh_handle.await;
    info!("Shutting down");

    Ok(())
}

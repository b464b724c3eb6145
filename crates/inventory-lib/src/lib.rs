//! Cloud resource inventory library
//!
//! This crate provides the core functionality for:
//! - Multi-region, multi-service resource collection into one unified table
//! - Per-resource metric and cost enrichment
//! - Natural-language queries translated into structured filters
//! - Cost breakdowns, forecasts and optimization recommendations
//! - Health checks and observability

pub mod advisor;
pub mod analysis;
pub mod backend;
pub mod cache;
pub mod collector;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod models;
pub mod observability;
pub mod query;

pub use error::{BackendError, QueryError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{InventoryMetrics, StructuredLogger};
pub use query::{InventoryQuery, QueryAnswer};

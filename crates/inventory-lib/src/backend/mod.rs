//! Boundaries to the external systems the pipeline reads from
//!
//! Each backend is a trait so that clients are built once and injected into
//! fetchers and collectors. Three implementations ship with the crate:
//!
//! - [`HttpGateway`]: JSON client for an inventory gateway that fronts the
//!   cloud provider's enumeration, metrics and billing APIs
//! - [`FixtureBackend`]: in-memory snapshot used by tests and offline mode
//! - [`MessagesClient`]: text-generation client for the query translator and
//!   the advisor

mod billing;
mod fixture;
mod gateway;
mod inventory;
mod messages;
mod metrics;
mod text;

pub use billing::{
    BillingBackend, CostDimension, CostGroup, CostQuery, CostResponse, DateInterval,
    DimensionValues, FilterExpression, Granularity, GroupDefinition, MetricValue, ResultByTime,
    TagValues, UNBLENDED_COST,
};
pub use fixture::{CostEntry, FixtureBackend, MetricSeries};
pub use gateway::{GatewayConfig, HttpGateway};
pub use inventory::{
    Bucket, DbEndpoint, DbInstance, FunctionConfiguration, FunctionPage, Instance, InstanceState,
    InventoryBackend, Reservation, Tag, tags_to_map,
};
pub use messages::{MessagesClient, MessagesConfig};
pub use metrics::{Datapoint, MetricDimension, MetricQuery, MetricsBackend, Statistic};
pub use text::{GenerationParams, TextGenerator};

use crate::error::BackendError;
use std::future::Future;
use std::time::Duration;

/// Result of one backend call
pub type BackendResult<T> = Result<T, BackendError>;

/// Default upper bound for any single backend call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a backend call, failing with [`BackendError::Timeout`] once `limit` elapses
pub async fn bounded<T, F>(limit: Duration, call: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(limit)),
    }
}

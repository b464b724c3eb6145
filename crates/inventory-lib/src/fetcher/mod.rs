//! Per-resource enrichment: recent metrics and trailing-window cost
//!
//! Both fetchers absorb every backend failure. The metric fetcher degrades to
//! a partial or empty mapping; the cost fetcher degrades to `0.0`.

mod cost;
mod metrics;

pub use cost::{CostFetcher, CostStrategy, COST_WINDOW_DAYS, RESOURCE_COST_WINDOW_DAYS};
pub use metrics::{catalog, MetricCatalog, MetricFetcher, MetricSpec};

//! Long-lived inventory service: backends, cached table and derived views

use crate::config::InventoryConfig;
use anyhow::Result;
use async_trait::async_trait;
use inventory_lib::{
    advisor::Advisor,
    analysis::{recommend, total_savings, CostAnalysis, CostAnalyzer, CostPrediction, Recommendation},
    backend::{
        BillingBackend, FixtureBackend, GenerationParams, HttpGateway, InventoryBackend,
        MessagesClient, MetricsBackend, TextGenerator,
    },
    cache::{Snapshot, SnapshotCache},
    collector::{create_collectors, discover_regions, Aggregator, CollectionReport, CollectorContext},
    fetcher::{CostFetcher, MetricFetcher},
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    query::{apply, InventoryQuery, QueryTranslator},
    BackendError, QueryAnswer, QueryPredicate, ResourceTable, ServiceType,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Backend handles built once at startup
#[derive(Clone)]
pub struct Backends {
    pub inventory: Arc<dyn InventoryBackend>,
    pub metrics: Arc<dyn MetricsBackend>,
    pub billing: Arc<dyn BillingBackend>,
    pub text: Arc<dyn TextGenerator>,
}

impl Backends {
    /// Gateway and messages clients, or a fixture snapshot in offline mode
    pub fn from_config(config: &InventoryConfig) -> Result<Self> {
        let text: Arc<dyn TextGenerator> = if config.llm_api_key.is_empty() {
            Arc::new(DisabledGenerator)
        } else {
            Arc::new(MessagesClient::new(&config.messages())?)
        };

        if let Some(path) = &config.fixture_path {
            info!(path = %path.display(), "Serving inventory from fixture");
            let fixture = Arc::new(FixtureBackend::from_path(path)?);
            return Ok(Self::from_fixture(fixture, text));
        }

        let gateway = Arc::new(HttpGateway::new(&config.gateway())?);
        info!(endpoint = %gateway.base_url(), "Using inventory gateway");
        Ok(Self {
            inventory: gateway.clone(),
            metrics: gateway.clone(),
            billing: gateway,
            text,
        })
    }

    pub fn from_fixture(fixture: Arc<FixtureBackend>, text: Arc<dyn TextGenerator>) -> Self {
        Self {
            inventory: fixture.clone(),
            metrics: fixture.clone(),
            billing: fixture,
            text,
        }
    }
}

/// Stands in for the text-generation service when no key is configured
struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn complete(&self, _prompt: &str, _params: GenerationParams) -> Result<String, BackendError> {
        Err(BackendError::Unavailable(
            "no text-generation API key configured".to_string(),
        ))
    }
}

/// Recommendations with their combined savings
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationReport {
    pub recommendations: Vec<Recommendation>,
    pub total_potential_savings: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// Everything the API serves, behind one cached collection pass
pub struct InventoryService {
    aggregator: Aggregator,
    cache: SnapshotCache<ResourceTable>,
    refresh_lock: Mutex<()>,
    analyzer: CostAnalyzer,
    query: InventoryQuery,
    advisor: Advisor,
    health: HealthRegistry,
}

impl InventoryService {
    pub fn new(
        aggregator: Aggregator,
        analyzer: CostAnalyzer,
        generator: Arc<dyn TextGenerator>,
        health: HealthRegistry,
        ttl: Duration,
        logger: StructuredLogger,
    ) -> Self {
        let translator = QueryTranslator::new(generator.clone()).with_logger(logger);
        Self {
            aggregator,
            cache: SnapshotCache::new(ttl),
            refresh_lock: Mutex::new(()),
            analyzer,
            query: InventoryQuery::from_translator(translator),
            advisor: Advisor::new(generator),
            health,
        }
    }

    /// Wire collectors, fetchers and analyzers over `backends`
    pub async fn build(
        config: &InventoryConfig,
        backends: Backends,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> (Self, Vec<String>) {
        let regions = match config.region_list() {
            Some(regions) => regions,
            None => discover_regions(backends.inventory.as_ref(), config.call_timeout()).await,
        };

        let metrics = MetricFetcher::new(backends.metrics.clone());
        let costs = CostFetcher::new(backends.billing.clone(), backends.inventory.clone())
            .with_strategy(config.cost_strategy);
        let context = CollectorContext::new(
            backends.inventory,
            metrics,
            costs,
            regions.clone(),
            config.collection(),
        );
        let aggregator = Aggregator::new(create_collectors(&context)).with_logger(logger.clone());
        let analyzer = CostAnalyzer::new(backends.billing).with_call_timeout(config.call_timeout());

        let service = Self::new(
            aggregator,
            analyzer,
            backends.text,
            health,
            config.refresh_interval(),
            logger,
        );
        (service, regions)
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Run one collection pass and replace the cached table
    pub async fn refresh(&self) -> CollectionReport {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> CollectionReport {
        let report = self.aggregator.run_pass().await;
        self.cache.store(report.table.clone()).await;
        self.health
            .record_pass(report.succeeded.len(), report.kinds_total())
            .await;
        self.health.set_ready(true).await;
        report
    }

    /// The cached table, collecting first when it is missing or stale
    pub async fn snapshot(&self) -> Snapshot<ResourceTable> {
        if let Some(snapshot) = self.cache.fresh().await {
            return snapshot;
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited
        if let Some(snapshot) = self.cache.fresh().await {
            return snapshot;
        }
        self.refresh_locked().await;
        match self.cache.latest().await {
            Some(snapshot) => snapshot,
            None => self.cache.store(ResourceTable::default()).await,
        }
    }

    /// Refresh whenever the cache expires until `shutdown` resolves
    pub async fn run_refresh_loop(self: Arc<Self>, shutdown: impl std::future::Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.cache.ttl());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.refresh().await;
                    if !report.failed.is_empty() {
                        warn!(failed = ?report.failed, "Collection pass incomplete");
                    }
                }
                _ = &mut shutdown => {
                    info!("Refresh loop stopping");
                    break;
                }
            }
        }
    }

    /// The table, optionally narrowed by an explicit predicate
    pub async fn resources(&self, predicate: Option<&QueryPredicate>) -> ResourceTable {
        let snapshot = self.snapshot().await;
        apply(&snapshot.value, predicate)
    }

    /// Free-text query over the cached table
    pub async fn query(&self, text: &str) -> QueryAnswer {
        let snapshot = self.snapshot().await;
        let answer = self.query.answer(&snapshot.value, text).await;
        if answer.translation == "unavailable" {
            self.health
                .set_degraded(components::TRANSLATOR, "text generation unavailable")
                .await;
        } else {
            self.health.set_healthy(components::TRANSLATOR).await;
        }
        answer
    }

    /// Trailing-window cost breakdowns; empty when billing is unavailable
    pub async fn cost_analysis(&self) -> CostAnalysis {
        match self.analyzer.analyze().await {
            Some(analysis) => {
                self.health.set_healthy(components::BILLING).await;
                analysis
            }
            None => {
                self.health
                    .set_degraded(components::BILLING, "cost queries failing")
                    .await;
                CostAnalysis::default()
            }
        }
    }

    pub async fn cost_predictions(&self, days: u64) -> BTreeMap<ServiceType, CostPrediction> {
        match self.analyzer.predict(days).await {
            Some(predictions) => {
                self.health.set_healthy(components::BILLING).await;
                predictions
            }
            None => {
                self.health
                    .set_degraded(components::BILLING, "cost queries failing")
                    .await;
                BTreeMap::new()
            }
        }
    }

    /// Rule-based recommendations, with a narrative strategy when `explain` is set
    pub async fn recommendations(&self, explain: bool) -> RecommendationReport {
        let snapshot = self.snapshot().await;
        let recommendations = recommend(&snapshot.value);
        let strategy = if explain {
            Some(self.advisor.recommendation_strategy(&recommendations).await)
        } else {
            None
        };

        RecommendationReport {
            total_potential_savings: total_savings(&recommendations),
            recommendations,
            strategy,
        }
    }

    pub async fn insights(&self) -> String {
        let analysis = self.cost_analysis().await;
        self.advisor.cost_insights(&analysis).await
    }

    /// Expert chat; without caller context the current inventory summary is used
    pub async fn chat(&self, question: &str, context: Option<serde_json::Value>) -> String {
        let context = match context {
            Some(context) => context,
            None => {
                let snapshot = self.snapshot().await;
                serde_json::json!({
                    "resource_counts": snapshot.value.count_by_kind(),
                    "total_cost": snapshot.value.total_cost(),
                    "collected_at": snapshot.collected_at,
                })
            }
        };
        self.advisor.chat(question, Some(&context)).await
    }
}

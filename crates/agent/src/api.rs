//! HTTP API: health checks, Prometheus metrics and the inventory surface

use crate::service::InventoryService;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use inventory_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::InventoryMetrics,
    KindConstraint, QueryPredicate, ServiceType,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Default look-back for cost predictions, in days
const PREDICTION_DAYS: u64 = 30;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: InventoryMetrics,
    pub service: Arc<InventoryService>,
}

impl AppState {
    pub fn new(service: Arc<InventoryService>, metrics: InventoryMetrics) -> Self {
        Self {
            health_registry: service.health().clone(),
            metrics,
            service,
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Optional explicit filter on `/api/v1/resources`
#[derive(Debug, Default, Deserialize)]
pub struct ResourceFilter {
    pub service_type: Option<String>,
    pub region: Option<String>,
    pub status: Option<String>,
}

impl ResourceFilter {
    fn predicate(self) -> Result<Option<QueryPredicate>, String> {
        let service_type = match self.service_type.as_deref() {
            None => None,
            Some(label) => Some(
                ServiceType::from_label(label)
                    .map(KindConstraint::from)
                    .ok_or_else(|| format!("unknown service_type {:?}", label))?,
            ),
        };
        let predicate = QueryPredicate {
            service_type,
            region: self.region,
            status: self.status,
        };
        Ok((!predicate.is_unconstrained()).then_some(predicate))
    }
}

async fn list_resources(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ResourceFilter>,
) -> impl IntoResponse {
    match filter.predicate() {
        Ok(predicate) => {
            let table = state.service.resources(predicate.as_ref()).await;
            Json(table).into_response()
        }
        Err(message) => bad_request(message).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

async fn run_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    Json(state.service.query(&request.query).await)
}

async fn costs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let analysis = state.service.cost_analysis().await;
    let total = analysis.total();
    Json(serde_json::json!({
        "total_cost": total,
        "service_costs": analysis.service_costs,
        "region_costs": analysis.region_costs,
        "daily_costs": analysis.daily_costs,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PredictionParams {
    pub days: Option<u64>,
}

async fn cost_predictions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictionParams>,
) -> impl IntoResponse {
    let days = params.days.unwrap_or(PREDICTION_DAYS).max(1);
    Json(state.service.cost_predictions(days).await)
}

#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    #[serde(default)]
    pub explain: bool,
}

async fn recommendations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecommendationParams>,
) -> impl IntoResponse {
    Json(state.service.recommendations(params.explain).await)
}

#[derive(Debug, Serialize)]
struct TextReply {
    text: String,
}

async fn insights(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(TextReply {
        text: state.service.insights().await,
    })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    if request.question.trim().is_empty() {
        return bad_request("question must not be empty").into_response();
    }
    Json(TextReply {
        text: state.service.chat(&request.question, request.context).await,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
struct RefreshSummary {
    resources: usize,
    succeeded: Vec<ServiceType>,
    failed: Vec<ServiceType>,
    elapsed_ms: u128,
}

async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.service.refresh().await;
    Json(RefreshSummary {
        resources: report.table.len(),
        succeeded: report.succeeded,
        failed: report.failed,
        elapsed_ms: report.elapsed.as_millis(),
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/resources", get(list_resources))
        .route("/api/v1/query", post(run_query))
        .route("/api/v1/costs", get(costs))
        .route("/api/v1/costs/predictions", get(cost_predictions))
        .route("/api/v1/recommendations", get(recommendations))
        .route("/api/v1/insights", get(insights))
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/refresh", post(refresh))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

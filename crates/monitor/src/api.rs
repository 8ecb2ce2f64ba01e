//! HTTP read API for dashboard consumers and Prometheus metrics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use monitor_lib::{
    anomaly::AnomalyPipeline,
    health::{HealthMonitor, DEFAULT_ROLLING_WINDOW},
    performance::PerformanceTracker,
    store::MetricStore,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Default number of anomaly records returned by `/api/anomalies`
const DEFAULT_ANOMALY_LIMIT: usize = 50;

/// Shared application state
pub struct AppState {
    pub store: Arc<MetricStore>,
    pub pipeline: Arc<Mutex<AnomalyPipeline>>,
    pub monitor: Arc<HealthMonitor>,
    pub tracker: Arc<PerformanceTracker>,
}

impl AppState {
    pub fn new(
        store: Arc<MetricStore>,
        pipeline: Arc<Mutex<AnomalyPipeline>>,
        monitor: Arc<HealthMonitor>,
        tracker: Arc<PerformanceTracker>,
    ) -> Self {
        Self {
            store,
            pipeline,
            monitor,
            tracker,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnomalyQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RollingQuery {
    n: Option<usize>,
}

/// Model status for dashboards, including coverage during rollout
#[derive(Debug, Serialize)]
struct StatusResponse {
    model_trained: bool,
    trained_metrics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_age_secs: Option<i64>,
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
}

/// Recent anomaly evaluations, newest first
async fn anomalies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnomalyQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_ANOMALY_LIMIT);
    match state.store.recent_anomalies(limit) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => internal_error(err).into_response(),
    }
}

/// Rolling averages over the last `n` health snapshots
async fn health_rolling(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RollingQuery>,
) -> impl IntoResponse {
    let n = query.n.unwrap_or(DEFAULT_ROLLING_WINDOW);
    match state.monitor.rolling_average(n) {
        Ok(averages) => (StatusCode::OK, Json(averages)).into_response(),
        Err(err) => internal_error(err).into_response(),
    }
}

/// Current performance aggregates and alert flags
async fn performance(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.tracker.summary() {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => internal_error(err).into_response(),
    }
}

/// Model status - 503 while untrained so dashboards render a
/// "not yet trained" state instead of a false all-clear
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pipeline = match state.pipeline.lock() {
        Ok(pipeline) => pipeline,
        Err(err) => return internal_error(err).into_response(),
    };

    let trained = pipeline.is_trained();
    let response = StatusResponse {
        model_trained: trained,
        trained_metrics: pipeline.trained_metrics(),
        artifact_age_secs: pipeline
            .trained_at()
            .map(|at| (chrono::Utc::now().timestamp() - at).max(0)),
    };

    let status_code = if trained {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response)).into_response()
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return internal_error(err).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/anomalies", get(anomalies))
        .route("/api/health/rolling", get(health_rolling))
        .route("/api/performance", get(performance))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
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

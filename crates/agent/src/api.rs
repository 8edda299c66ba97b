//! HTTP API for health checks, Prometheus metrics and monitor status

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use monitor_lib::predictor::TrainedModel;
use monitor_lib::sink::{StatusSink, StatusSnapshot};
use monitor_lib::{ComponentStatus, HealthRegistry, Profile, SchedulerStats, StatsHandle};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub status: StatusSink,
    pub stats: StatsHandle,
    pub models: watch::Receiver<Option<Arc<TrainedModel>>>,
    pub profile: Arc<Profile>,
}

/// Body of `/status`
#[derive(Debug, Serialize)]
struct StatusResponse {
    environment: String,
    profile_version: Option<String>,
    ai_enabled: bool,
    scheduler: SchedulerStats,
    #[serde(flatten)]
    latest: StatusSnapshot,
    model: Option<TrainedModel>,
}

/// 200 while healthy or degraded, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Latest verdict, forecast and anomalies plus scheduler counters
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let model = state.models.borrow().as_deref().cloned();
    Json(StatusResponse {
        environment: state.profile.environment.to_string(),
        profile_version: state.profile.version.clone(),
        ai_enabled: state.profile.ai_enabled(),
        scheduler: state.stats.snapshot(),
        latest: state.status.snapshot().await,
        model,
    })
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/status", get(status))
        .with_state(state)
}

pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

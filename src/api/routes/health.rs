//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (hub loop is answering)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 while the hub control loop answers queries, 503 otherwise.
pub async fn readiness(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.hub.member_count().await?;
    Ok(StatusCode::OK)
}

/// GET /health
///
/// Full health status with connection count.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let count = state.hub.member_count().await;

    let (status, hub, connections) = match count {
        Ok(n) => ("healthy", "ok", n),
        Err(_) => ("unhealthy", "stopped", 0),
    };

    Json(HealthResponse {
        status: status.to_string(),
        hub: hub.to_string(),
        connections,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

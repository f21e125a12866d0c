//! Liveness and readiness endpoints.

use crate::api::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
}

/// GET /health - process is up and serving. Never depends on backend state.
pub async fn liveness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LivenessResponse {
        status: "ok",
        uptime_seconds: state.metrics_collector.uptime_seconds(),
    })
}

/// GET /ready - 200 iff at least one model is `Running` and prober-healthy,
/// else 503. Orchestrators should gate traffic on this, not `/health`.
pub async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.status_aggregator.aggregate().await;
    if state.status_aggregator.is_ready(&status) {
        (StatusCode::OK, Json(status))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(status))
    }
}

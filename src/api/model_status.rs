//! Model status endpoint handler.

use crate::api::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

/// GET /v1/models/status - Per-model lifecycle, health, and GPU view.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<crate::status::StatusResponse> {
    Json(state.status_aggregator.aggregate().await)
}

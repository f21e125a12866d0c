//! Explicit backend start/stop and the smart-switch entry point.

use crate::api::types::ApiError;
use crate::api::AppState;
use crate::state::BackendState;
use crate::switch::{SwitchError, SwitchOutcome};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub status: &'static str,
    pub model: String,
}

/// POST /v1/models/{id}/start - explicit start, no eviction.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    let spec = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::model_not_found(&id, &state.registry.ids()))?;

    state
        .state_table
        .set(&id, BackendState::Loading { started_at: Utc::now() });
    state
        .container
        .start(&spec.container_handle)
        .await
        .map_err(|e| ApiError::switch_failed(&format!("failed to start {}: {}", id, e)))?;

    Ok(Json(LifecycleResponse {
        status: "starting",
        model: id,
    }))
}

/// POST /v1/models/{id}/stop - explicit stop.
pub async fn stop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    let spec = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::model_not_found(&id, &state.registry.ids()))?;

    state.state_table.set(&id, BackendState::Unloading);
    state
        .container
        .stop(&spec.container_handle)
        .await
        .map_err(|e| ApiError::switch_failed(&format!("failed to stop {}: {}", id, e)))?;
    state.state_table.set(&id, BackendState::Stopped);

    Ok(Json(LifecycleResponse {
        status: "stopped",
        model: id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SwitchQuery {
    pub target_model: String,
}

/// POST /v1/models/switch?target_model=... - VRAM-budget-aware smart switch.
pub async fn switch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SwitchQuery>,
) -> Response {
    match state.switch_engine.switch(&query.target_model).await {
        Ok(outcome) => (axum::http::StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => switch_error_response(err).into_response(),
    }
}

fn switch_error_response(err: SwitchError) -> ApiError {
    match err {
        SwitchError::ModelNotFound(model) => ApiError::model_not_found(&model, &[]),
        SwitchError::SwitchInProgress(target) => ApiError::switch_in_progress(&target),
        SwitchError::InsufficientMemory {
            required_gb,
            available_gb,
            achievable_gb,
        } => ApiError::insufficient_memory(required_gb, available_gb, achievable_gb),
        SwitchError::SwitchFailed(message) => ApiError::switch_failed(&message),
    }
}

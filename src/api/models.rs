//! Models listing endpoint handler.

use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

/// Models list response in OpenAI format.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelObject>,
}

/// Individual model object.
#[derive(Debug, Serialize)]
pub struct ModelObject {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

/// GET /v1/models - List the static model registry in OpenAI format.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let mut data: Vec<ModelObject> = state
        .registry
        .all()
        .map(|spec| ModelObject {
            id: spec.id.clone(),
            object: "model".to_string(),
            created: chrono::Utc::now().timestamp(),
            owned_by: "gateway".to_string(),
        })
        .collect();
    data.sort_by(|a, b| a.id.cmp(&b.id));

    Json(ModelsResponse {
        object: "list".to_string(),
        data,
    })
}

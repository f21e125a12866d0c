//! Legacy `/v1/completions` handler: same routing and error mapping as
//! `api::completions`, but never runs requests through the tool translator.
//! The legacy wire shape (`prompt` instead of `messages`) is opaque JSON
//! here rather than a typed struct, since the translation layer has nothing
//! to contribute to it.

use crate::api::headers::inject_request_id;
use crate::api::types::ApiError;
use crate::api::AppState;
use crate::state::BackendState;
use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_RETRY_AFTER_SECONDS: u64 = 5;

/// POST /v1/completions.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<axum::response::Response, ApiError> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("missing 'model' field"))?;

    let spec = state
        .registry
        .get(model)
        .cloned()
        .ok_or_else(|| ApiError::model_not_found(model, &state.registry.ids()))?;

    if let Some(BackendState::Loading { .. }) = state.state_table.get(&spec.id) {
        return Err(ApiError::model_loading(&spec.id, DEFAULT_RETRY_AFTER_SECONDS));
    }

    let url = format!("{}/v1/completions", spec.backend_base_url);
    let mut req = state.http_client.post(&url).json(&body);
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        req = req.header(axum::http::header::AUTHORIZATION, auth);
    }

    let response = req.send().await.map_err(|e| {
        if e.is_timeout() {
            ApiError::backend_timeout()
        } else {
            ApiError::backend_unavailable(
                &format!("backend connection failed: {}", e),
                DEFAULT_RETRY_AFTER_SECONDS,
            )
        }
    })?;
    let status = response.status();

    let mut resp = if status.is_success() {
        let parsed: Value = response
            .json()
            .await
            .map_err(|e| ApiError::bad_gateway(&format!("invalid backend response: {}", e)))?;
        Json(parsed).into_response()
    } else if status.is_server_error() {
        warn!(model = %spec.id, %status, "backend returned server error");
        return Err(ApiError::backend_unavailable(
            &format!("backend returned {}", status),
            DEFAULT_RETRY_AFTER_SECONDS,
        ));
    } else {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("error")?.get("message")?.as_str().map(str::to_string))
            .unwrap_or(text);
        return Err(ApiError::bad_request(&message));
    };

    let request_id = headers
        .get(crate::api::headers::REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(crate::logging::generate_request_id);
    inject_request_id(&mut resp, &request_id);
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_model_field_is_bad_request() {
        let state = Arc::new(crate::api::test_support::test_app_state());
        let err = handle(State(state), HeaderMap::new(), Json(serde_json::json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.error.code.as_deref(), Some("invalid_request"));
    }

    #[tokio::test]
    async fn test_unknown_model_returns_not_found() {
        let state = Arc::new(crate::api::test_support::test_app_state());
        let err = handle(
            State(state),
            HeaderMap::new(),
            Json(serde_json::json!({"model": "missing", "prompt": "hi"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error.code.as_deref(), Some("model_not_found"));
    }
}

//! Chat completions endpoint handler: the proxy core of §4.4.

use crate::api::headers::inject_request_id;
use crate::api::types::{ApiError, ChatCompletionRequest, ChatCompletionResponse};
use crate::api::validation;
use crate::api::AppState;
use crate::registry::ModelSpec;
use crate::state::BackendState;
use crate::tools::ToolCallStreamRewriter;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

/// Retry-After sent with `503 model_loading`/`backend_unavailable` when the
/// caller has no better signal (no expected-load-seconds is available, or
/// the backend simply refused the connection rather than being mid-boot).
const DEFAULT_RETRY_AFTER_SECONDS: u64 = 5;

/// POST /v1/chat/completions.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    let start_time = std::time::Instant::now();
    info!(model = %request.model, stream = request.stream, "chat completion request");

    validation::validate(&request)?;

    let spec = resolve_model(&state, &request.model)?;
    reject_if_loading(&state, &spec)?;

    let has_tools = request.has_tools();
    let outbound = if has_tools {
        crate::tools::inject(&request, spec.tool_role_mode)
    } else {
        request.clone()
    };

    if request.stream {
        return handle_streaming(state, headers, spec, outbound, has_tools).await;
    }

    let mut response = proxy_json(&state, &spec, "/v1/chat/completions", &headers, &outbound).await?;

    if has_tools {
        crate::tools::extract::apply_to_response(&mut response)
            .map_err(|e| ApiError::tool_parse_error(&e.to_string()))?;
    }

    let sanitized_model = state.metrics_collector.sanitize_label(&spec.id);
    metrics::counter!("gateway_requests_total", "model" => sanitized_model.clone(), "status" => "200").increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "model" => sanitized_model)
        .record(start_time.elapsed().as_secs_f64());

    let mut resp = Json(response).into_response();
    inject_request_id(&mut resp, &request_id(&headers));
    Ok(resp)
}

/// Looks up the target model, returning the `400 model_not_found` error the
/// proxy core owes callers for an unknown id.
fn resolve_model(state: &Arc<AppState>, model: &str) -> Result<ModelSpec, ApiError> {
    state
        .registry
        .get(model)
        .cloned()
        .ok_or_else(|| ApiError::model_not_found(model, &state.registry.ids()))
}

/// A model mid-boot is never proxied to directly: the caller gets
/// `503 model_loading` rather than a connection-refused surprise.
fn reject_if_loading(state: &Arc<AppState>, spec: &ModelSpec) -> Result<(), ApiError> {
    if let Some(BackendState::Loading { .. }) = state.state_table.get(&spec.id) {
        return Err(ApiError::model_loading(&spec.id, DEFAULT_RETRY_AFTER_SECONDS));
    }
    Ok(())
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(crate::api::headers::REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(crate::logging::generate_request_id)
}

/// POSTs `body` to `{backend_base_url}{path}` and deserializes a 2xx reply.
/// Never retried: per §7, POSTs may be non-idempotent once tools are in
/// play, so a transport failure here is surfaced to the caller directly.
async fn proxy_json(
    state: &Arc<AppState>,
    spec: &ModelSpec,
    path: &str,
    headers: &HeaderMap,
    body: &ChatCompletionRequest,
) -> Result<ChatCompletionResponse, ApiError> {
    let url = format!("{}{}", spec.backend_base_url, path);
    let mut req = state.http_client.post(&url).json(body);
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        req = req.header(axum::http::header::AUTHORIZATION, auth);
    }

    let response = req.send().await.map_err(|e| classify_transport_error(&e))?;
    let status = response.status();

    if status.is_success() {
        return response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ApiError::bad_gateway(&format!("invalid backend response: {}", e)));
    }

    if status.is_server_error() {
        warn!(model = %spec.id, %status, "backend returned server error");
        return Err(ApiError::backend_unavailable(
            &format!("backend returned {}", status),
            DEFAULT_RETRY_AFTER_SECONDS,
        ));
    }

    let body_text = response.text().await.unwrap_or_default();
    Err(relay_client_error(status, &body_text))
}

fn classify_transport_error(e: &reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::backend_timeout()
    } else {
        ApiError::backend_unavailable(
            &format!("backend connection failed: {}", e),
            DEFAULT_RETRY_AFTER_SECONDS,
        )
    }
}

/// Relays a 4xx from the backend, remapped into this gateway's OpenAI-shaped
/// error envelope rather than forwarded byte-for-byte.
fn relay_client_error(_status: axum::http::StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    ApiError::bad_request(&message)
}

async fn handle_streaming(
    state: Arc<AppState>,
    headers: HeaderMap,
    spec: ModelSpec,
    request: ChatCompletionRequest,
    translate_tools: bool,
) -> Result<Response, ApiError> {
    info!(model = %spec.id, "starting streaming request");
    let req_id = request_id(&headers);
    let stream = create_sse_stream(state, spec, headers, request, translate_tools);
    let mut resp = Sse::new(stream).into_response();
    inject_request_id(&mut resp, &req_id);
    Ok(resp)
}

/// Proxies SSE chunks from the backend, line-buffering on `\n` the same way
/// the teacher's original streaming handler did. With no tools in play this
/// is byte-exact passthrough; with tools in play, every chunk is fed through
/// `ToolCallStreamRewriter` instead and nothing is emitted until the backend
/// signals end-of-stream.
fn create_sse_stream(
    state: Arc<AppState>,
    spec: ModelSpec,
    headers: HeaderMap,
    request: ChatCompletionRequest,
    translate_tools: bool,
) -> impl futures::Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        let url = format!("{}/v1/chat/completions", spec.backend_base_url);
        let mut req = state.http_client.post(&url).json(&request);
        if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
            req = req.header(axum::http::header::AUTHORIZATION, auth);
        }

        let response = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(model = %spec.id, error = %e, "backend connection failed");
                yield Ok(error_event(&format!("backend connection failed: {}", e)));
                yield Ok(Event::default().data("[DONE]"));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(model = %spec.id, %status, "backend returned error");
            yield Ok(error_event(&format!("backend returned {}: {}", status, body)));
            yield Ok(Event::default().data("[DONE]"));
            return;
        }

        let mut rewriter = ToolCallStreamRewriter::new();
        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();

        'outer: while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(model = %spec.id, error = %e, "stream read error");
                    break;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer = buffer[pos + 1..].to_string();
                if line.is_empty() {
                    continue;
                }
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };

                if !translate_tools {
                    yield Ok(Event::default().data(data));
                    if data == "[DONE]" {
                        return;
                    }
                    continue;
                }

                if data == "[DONE]" {
                    break 'outer;
                }
                let chunk = match serde_json::from_str(data) {
                    Ok(chunk) => chunk,
                    Err(_) => continue,
                };
                if rewriter.accumulate(&chunk) {
                    break 'outer;
                }
            }
        }

        if translate_tools {
            match rewriter.finish() {
                Ok(chunks) => {
                    for chunk in chunks {
                        yield Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()));
                    }
                }
                Err(e) => {
                    yield Ok(error_event(&e.to_string()));
                }
            }
            yield Ok(Event::default().data("[DONE]"));
        }
    }
}

fn error_event(message: &str) -> Event {
    let chunk = serde_json::json!({
        "error": {"message": message, "type": "server_error", "code": "backend_unavailable"}
    });
    Event::default().event("error").data(chunk.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_unknown_returns_model_not_found() {
        let state = Arc::new(crate::api::test_support::test_app_state());
        let err = resolve_model(&state, "missing").unwrap_err();
        assert_eq!(err.error.code.as_deref(), Some("model_not_found"));
    }

    #[test]
    fn test_relay_client_error_extracts_openai_message() {
        let body = r#"{"error":{"message":"nope","type":"invalid_request_error"}}"#;
        let err = relay_client_error(axum::http::StatusCode::BAD_REQUEST, body);
        assert!(err.error.message.contains("nope"));
    }

    #[test]
    fn test_relay_client_error_falls_back_to_raw_body() {
        let err = relay_client_error(axum::http::StatusCode::BAD_REQUEST, "not json");
        assert_eq!(err.error.message, "not json");
    }
}

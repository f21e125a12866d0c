//! Request and response types for the OpenAI-compatible API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Chat completion request matching OpenAI format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Tool definitions the model may call. Absent or empty means the
    /// tool-calling translation layer is a no-op for this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    /// Pass through any additional fields to backend
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ChatCompletionRequest {
    /// True when the tool translation layer has nothing to do for this
    /// request (no `tools`, or an empty array).
    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_usage: Option<bool>,
}

/// A tool the model may call, in OpenAI's `{type:"function", function:{...}}` shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// A single message in the conversation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(flatten)]
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Message content - either text or multimodal parts.
///
/// `Null` is reserved for assistant messages whose content was entirely a
/// tool-call envelope: the translator replaces it so the wire response
/// carries a literal `content: null`, matching OpenAI's shape once
/// `tool_calls` is populated. Declared last so untagged deserialization
/// never shadows `Text`/`Parts` for ordinary requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text { content: String },
    Parts { content: Vec<ContentPart> },
    Null { content: () },
}

impl MessageContent {
    pub fn null() -> Self {
        MessageContent::Null { content: () }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { content } => Some(content.as_str()),
            _ => None,
        }
    }
}

/// Content part for multimodal messages.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageUrl>,
}

/// Image URL for vision requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// A tool call emitted by the model (or injected back by a `role=tool` reply).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, passed through as an opaque string per the
    /// OpenAI wire format (backends emit it already-stringified).
    pub arguments: String,
}

/// Chat completion response (non-streaming).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A single choice in the response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Chat completion chunk for streaming responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

/// A single choice in a streaming chunk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Delta content in a streaming chunk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Streamed tool-call fragment. The translation layer only ever emits these
/// as a single complete fragment per call (see `tools::stream`), but the
/// shape still carries `index` so multi-fragment-capable clients work.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCallDelta>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionCallDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// API error response in OpenAI format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
    /// Seconds clients should wait before retrying, surfaced as a
    /// `Retry-After` header rather than a body field.
    #[serde(skip)]
    pub retry_after_seconds: Option<u64>,
}

/// Error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievable_gb: Option<f64>,
}

impl ApiErrorBody {
    fn plain(message: impl Into<String>, r#type: &str, code: &str) -> Self {
        Self {
            message: message.into(),
            r#type: r#type.to_string(),
            param: None,
            code: Some(code.to_string()),
            required_gb: None,
            available_gb: None,
            achievable_gb: None,
        }
    }
}

impl ApiError {
    fn simple(body: ApiErrorBody) -> Self {
        Self {
            error: body,
            retry_after_seconds: None,
        }
    }

    /// Create a bad request error (400).
    pub fn bad_request(message: &str) -> Self {
        Self::simple(ApiErrorBody::plain(
            message,
            "invalid_request_error",
            "invalid_request",
        ))
    }

    /// Create a model not found error (400) with available models hint.
    pub fn model_not_found(model: &str, available: &[String]) -> Self {
        let hint = if available.is_empty() {
            "No models available".to_string()
        } else {
            format!("Available: {}", available.join(", "))
        };
        let mut body = ApiErrorBody::plain(
            format!("Model '{}' not found. {}", model, hint),
            "invalid_request_error",
            "model_not_found",
        );
        body.param = Some("model".to_string());
        Self::simple(body)
    }

    /// A `role=tool` message whose `tool_call_id` doesn't match any earlier
    /// assistant `tool_calls` entry (400).
    pub fn invalid_tool_message(message: &str) -> Self {
        Self::simple(ApiErrorBody::plain(
            message,
            "invalid_request_error",
            "invalid_tool_message",
        ))
    }

    /// Missing or invalid `Authorization` bearer token (401).
    pub fn invalid_api_key() -> Self {
        Self::simple(ApiErrorBody::plain(
            "Invalid API key",
            "invalid_request_error",
            "invalid_api_key",
        ))
    }

    /// Origin not present in `allowed_origins` (403).
    pub fn forbidden_origin(origin: &str) -> Self {
        Self::simple(ApiErrorBody::plain(
            format!("Origin '{}' is not allowed", origin),
            "invalid_request_error",
            "forbidden_origin",
        ))
    }

    /// Target model exists but is still starting (503, `Retry-After`).
    pub fn model_loading(model: &str, retry_after_seconds: u64) -> Self {
        let mut err = Self::simple(ApiErrorBody::plain(
            format!("Model '{}' is loading", model),
            "server_error",
            "model_loading",
        ));
        err.retry_after_seconds = Some(retry_after_seconds);
        err
    }

    /// Target model's backend refused the connection (503, `Retry-After`).
    pub fn backend_unavailable(message: &str, retry_after_seconds: u64) -> Self {
        let mut err = Self::simple(ApiErrorBody::plain(
            message,
            "server_error",
            "backend_unavailable",
        ));
        err.retry_after_seconds = Some(retry_after_seconds);
        err
    }

    /// Create a bad gateway error (502).
    pub fn bad_gateway(message: &str) -> Self {
        Self::simple(ApiErrorBody::plain(message, "server_error", "bad_gateway"))
    }

    /// Backend response could not be parsed as a tool call (502).
    pub fn tool_parse_error(message: &str) -> Self {
        Self::simple(ApiErrorBody::plain(
            message,
            "server_error",
            "tool_parse_error",
        ))
    }

    /// Create a gateway timeout error (504).
    pub fn gateway_timeout() -> Self {
        Self::simple(ApiErrorBody::plain(
            "Backend request timed out",
            "server_error",
            "gateway_timeout",
        ))
    }

    /// Backend request exceeded the configured timeout (504).
    pub fn backend_timeout() -> Self {
        Self::simple(ApiErrorBody::plain(
            "Backend request timed out",
            "server_error",
            "backend_timeout",
        ))
    }

    /// Create a service unavailable error (503).
    pub fn service_unavailable(message: &str) -> Self {
        Self::simple(ApiErrorBody::plain(
            message,
            "server_error",
            "service_unavailable",
        ))
    }

    /// A different switch target is already in flight (409).
    pub fn switch_in_progress(target: &str) -> Self {
        Self::simple(ApiErrorBody::plain(
            format!("Switch already in progress for '{}'", target),
            "server_error",
            "switch_in_progress",
        ))
    }

    /// No eviction set can free enough VRAM for the requested switch (507).
    pub fn insufficient_memory(required_gb: f64, available_gb: f64, achievable_gb: f64) -> Self {
        let mut body = ApiErrorBody::plain(
            format!(
                "Insufficient GPU memory: required {:.1}GB, available {:.1}GB, achievable {:.1}GB",
                required_gb, available_gb, achievable_gb
            ),
            "server_error",
            "insufficient_memory",
        );
        body.required_gb = Some(required_gb);
        body.available_gb = Some(available_gb);
        body.achievable_gb = Some(achievable_gb);
        Self::simple(body)
    }

    /// The switch engine gave up mid-sequence (500) with a diagnostic.
    pub fn switch_failed(message: &str) -> Self {
        Self::simple(ApiErrorBody::plain(
            message,
            "server_error",
            "switch_failed",
        ))
    }

    /// Get the HTTP status code for this error.
    fn status_code(&self) -> StatusCode {
        match self.error.code.as_deref() {
            Some("invalid_api_key") => StatusCode::UNAUTHORIZED,
            Some("model_not_found") | Some("invalid_tool_message") | Some("invalid_request")
            | Some("invalid_request_error") => StatusCode::BAD_REQUEST,
            Some("forbidden_origin") => StatusCode::FORBIDDEN,
            Some("model_loading") | Some("backend_unavailable") | Some("service_unavailable") => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Some("backend_timeout") | Some("gateway_timeout") => StatusCode::GATEWAY_TIMEOUT,
            Some("insufficient_memory") => {
                StatusCode::from_u16(507).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Some("switch_in_progress") => StatusCode::CONFLICT,
            Some("switch_failed") => StatusCode::INTERNAL_SERVER_ERROR,
            Some("tool_parse_error") | Some("bad_gateway") => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after_seconds;
        let mut response = (status, Json(&self)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

//! Cross-field request validation for `/v1/chat/completions`.
//!
//! Extra/unknown top-level fields are never rejected here — they round-trip
//! through `ChatCompletionRequest::extra` untouched. Validation only covers
//! invariants the translation layer and backends actually depend on.

use crate::api::types::{ApiError, ChatCompletionRequest};

pub fn validate(request: &ChatCompletionRequest) -> Result<(), ApiError> {
    validate_sampling_params(request)?;
    validate_tool_choice(request)?;
    validate_tool_call_ids(request)?;
    Ok(())
}

fn validate_sampling_params(request: &ChatCompletionRequest) -> Result<(), ApiError> {
    if let Some(temperature) = request.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ApiError::bad_request("temperature must be between 0 and 2"));
        }
    }
    if let Some(top_p) = request.top_p {
        if !(0.0..=1.0).contains(&top_p) {
            return Err(ApiError::bad_request("top_p must be between 0 and 1"));
        }
    }
    if let Some(max_tokens) = request.max_tokens {
        if max_tokens == 0 {
            return Err(ApiError::bad_request("max_tokens must be greater than 0"));
        }
    }
    Ok(())
}

fn validate_tool_choice(request: &ChatCompletionRequest) -> Result<(), ApiError> {
    let Some(choice) = &request.tool_choice else {
        return Ok(());
    };
    if let Some(s) = choice.as_str() {
        if matches!(s, "none" | "auto" | "required") {
            return Ok(());
        }
        return Err(ApiError::bad_request(
            "tool_choice string must be one of: none, auto, required",
        ));
    }
    if let Some(obj) = choice.as_object() {
        let type_ok = obj.get("type").and_then(|v| v.as_str()) == Some("function");
        let name_ok = obj
            .get("function")
            .and_then(|f| f.as_object())
            .and_then(|f| f.get("name"))
            .and_then(|n| n.as_str())
            .is_some_and(|n| !n.is_empty());
        if type_ok && name_ok {
            return Ok(());
        }
    }
    Err(ApiError::bad_request(
        "tool_choice must be \"none\"|\"auto\"|\"required\" or {type:\"function\",function:{name}}",
    ))
}

/// Every `role=tool` message's `tool_call_id` must reference an id emitted
/// by an earlier `role=assistant` message's `tool_calls`.
fn validate_tool_call_ids(request: &ChatCompletionRequest) -> Result<(), ApiError> {
    let mut known_ids = std::collections::HashSet::new();
    for message in &request.messages {
        if message.role == "assistant" {
            if let Some(tool_calls) = &message.tool_calls {
                known_ids.extend(tool_calls.iter().map(|c| c.id.as_str()));
            }
        }
        if message.role == "tool" {
            let id = message.tool_call_id.as_deref().unwrap_or("");
            if id.is_empty() || !known_ids.contains(id) {
                return Err(ApiError::invalid_tool_message(&format!(
                    "tool message tool_call_id '{}' does not match any preceding assistant tool_calls id",
                    id
                )));
            }
        }
    }
    Ok(())
}

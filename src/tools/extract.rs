//! Response-side tool translation: detects a model-emitted tool-call
//! envelope in plain-text content and rewrites it into OpenAI `tool_calls`.

use crate::api::types::{ChatCompletionResponse, Choice, FunctionCall, MessageContent, ToolCall};
use crate::tools::error::ToolTranslationError;
use rand::Rng;
use serde::Deserialize;

const CALL_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CALL_ID_LEN: usize = 24;

pub struct ExtractedToolCalls {
    pub tool_calls: Vec<ToolCall>,
    /// True when `content` was entirely the JSON envelope, nothing else —
    /// the caller should null out `content` in that case.
    pub was_pure_envelope: bool,
}

/// Generates a client-facing tool-call id when the backend omitted one.
pub fn generate_tool_call_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CALL_ID_LEN)
        .map(|_| CALL_ID_ALPHABET[rng.gen_range(0..CALL_ID_ALPHABET.len())] as char)
        .collect();
    format!("call_{}", suffix)
}

#[derive(Deserialize)]
struct ToolCallEnvelope {
    tool_calls: Vec<RawToolCall>,
}

#[derive(Deserialize)]
struct RawToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default = "default_call_type")]
    call_type: String,
    function: RawFunctionCall,
}

#[derive(Deserialize)]
struct RawFunctionCall {
    name: String,
    arguments: String,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// Tries, in order, a fenced ```json block and a bare leading JSON object.
/// Returns `None` when `content` shows no sign of a tool-call attempt.
pub fn extract(content: &str) -> Option<Result<ExtractedToolCalls, ToolTranslationError>> {
    if let Some((json_str, pure)) = fenced_json_block(content) {
        return Some(parse_envelope(&json_str, pure));
    }
    if let Some((json_str, pure)) = bare_json_prefix(content) {
        return Some(parse_envelope(&json_str, pure));
    }
    None
}

fn parse_envelope(json_str: &str, pure: bool) -> Result<ExtractedToolCalls, ToolTranslationError> {
    let envelope: ToolCallEnvelope = serde_json::from_str(json_str)
        .map_err(|e| ToolTranslationError::UnparseableToolCall(e.to_string()))?;
    let mut tool_calls = Vec::with_capacity(envelope.tool_calls.len());
    for raw in envelope.tool_calls {
        if raw.function.name.is_empty() {
            return Err(ToolTranslationError::MissingFunctionName);
        }
        tool_calls.push(ToolCall {
            id: raw.id.unwrap_or_else(generate_tool_call_id),
            call_type: raw.call_type,
            function: FunctionCall {
                name: raw.function.name,
                arguments: raw.function.arguments,
            },
        });
    }
    Ok(ExtractedToolCalls {
        tool_calls,
        was_pure_envelope: pure,
    })
}

/// Finds a ```json ... ``` fence and reports whether it was the only
/// non-whitespace content in the string.
fn fenced_json_block(content: &str) -> Option<(String, bool)> {
    let marker = "```json";
    let start = content.find(marker)?;
    let after_marker = start + marker.len();
    let close_rel = content[after_marker..].find("```")?;
    let close_abs = after_marker + close_rel;
    let json_str = content[after_marker..close_abs].trim().to_string();
    let end = close_abs + 3;
    let before = content[..start].trim();
    let after = content[end..].trim();
    Some((json_str, before.is_empty() && after.is_empty()))
}

/// Finds a balanced `{...}` object at the start of `content` (ignoring
/// leading whitespace), using brace-depth counting that respects quoted
/// strings. Reports whether it was the only non-whitespace content.
fn bare_json_prefix(content: &str) -> Option<(String, bool)> {
    let trimmed = content.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }
    let leading_ws_len = content.len() - trimmed.len();
    let bytes = trimmed.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    let mut end = None;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i + 1);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    let json_str = trimmed[..end].to_string();
    let before = content[..leading_ws_len].trim();
    let after = trimmed[end..].trim();
    Some((json_str, before.is_empty() && after.is_empty()))
}

/// Applies extraction to every choice in a non-streaming response in place.
/// A choice with no tool-call-shaped content is left untouched.
pub fn apply_to_response(response: &mut ChatCompletionResponse) -> Result<(), ToolTranslationError> {
    for choice in &mut response.choices {
        apply_to_choice(choice)?;
    }
    Ok(())
}

fn apply_to_choice(choice: &mut Choice) -> Result<(), ToolTranslationError> {
    let Some(content) = choice.message.content.as_text() else {
        return Ok(());
    };
    if content.is_empty() {
        return Ok(());
    }
    let Some(result) = extract(content) else {
        return Ok(());
    };
    let extracted = result?;
    choice.message.tool_calls = Some(extracted.tool_calls);
    if extracted.was_pure_envelope {
        choice.message.content = MessageContent::null();
    }
    choice.finish_reason = Some("tool_calls".to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::ChatMessage;

    fn choice_with_content(content: &str) -> Choice {
        Choice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: MessageContent::Text {
                    content: content.to_string(),
                },
                name: None,
                tool_calls: None,
                tool_call_id: None,
            },
            finish_reason: Some("stop".to_string()),
        }
    }

    #[test]
    fn test_extract_fenced_json_round_trip() {
        let content = "```json\n{\"tool_calls\":[{\"id\":\"call_abc\",\"type\":\"function\",\"function\":{\"name\":\"read_file\",\"arguments\":\"{\\\"path\\\":\\\"/tmp/a\\\"}\"}}]}\n```";
        let mut choice = choice_with_content(content);
        apply_to_choice(&mut choice).unwrap();
        let tool_calls = choice.message.tool_calls.unwrap();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].id, "call_abc");
        assert_eq!(tool_calls[0].function.name, "read_file");
        assert_eq!(tool_calls[0].function.arguments, "{\"path\":\"/tmp/a\"}");
        assert!(choice.message.content.as_text().is_none());
        assert_eq!(choice.finish_reason, Some("tool_calls".to_string()));
    }

    #[test]
    fn test_extract_bare_json_prefix() {
        let content = "{\"tool_calls\":[{\"type\":\"function\",\"function\":{\"name\":\"ping\",\"arguments\":\"{}\"}}]}";
        let mut choice = choice_with_content(content);
        apply_to_choice(&mut choice).unwrap();
        let tool_calls = choice.message.tool_calls.unwrap();
        assert_eq!(tool_calls.len(), 1);
        assert!(tool_calls[0].id.starts_with("call_"));
        assert_eq!(tool_calls[0].id.len(), "call_".len() + 24);
    }

    #[test]
    fn test_extract_generates_id_when_missing() {
        let id = generate_tool_call_id();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), 29);
    }

    #[test]
    fn test_plain_content_is_not_touched() {
        let mut choice = choice_with_content("4");
        apply_to_choice(&mut choice).unwrap();
        assert!(choice.message.tool_calls.is_none());
        assert_eq!(choice.finish_reason, Some("stop".to_string()));
    }

    #[test]
    fn test_malformed_envelope_surfaces_tool_parse_error() {
        let content = "```json\n{\"tool_calls\": not valid json\n```";
        let mut choice = choice_with_content(content);
        let err = apply_to_choice(&mut choice).unwrap_err();
        assert!(matches!(err, ToolTranslationError::UnparseableToolCall(_)));
    }

    #[test]
    fn test_prose_with_trailing_envelope_is_not_pure() {
        let content = "Sure, here you go:\n```json\n{\"tool_calls\":[{\"id\":\"call_x\",\"type\":\"function\",\"function\":{\"name\":\"f\",\"arguments\":\"{}\"}}]}\n```";
        let mut choice = choice_with_content(content);
        apply_to_choice(&mut choice).unwrap();
        // not pure: content is retained rather than nulled.
        assert!(choice.message.content.as_text().is_some());
    }
}

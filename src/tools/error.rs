/// Errors from the tool-calling translation layer, surfaced only at the
/// `502 tool_parse_error` boundary (see `crate::api::types::ApiError`).
#[derive(Debug, thiserror::Error)]
pub enum ToolTranslationError {
    #[error("backend content looked like a tool call but could not be parsed: {0}")]
    UnparseableToolCall(String),

    #[error("tool call in backend response is missing a function name")]
    MissingFunctionName,
}

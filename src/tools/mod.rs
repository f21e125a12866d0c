//! Bidirectional tool-calling translation between OpenAI `tools`/
//! `tool_calls` semantics and the plain-text chat the backends actually
//! speak.

pub mod error;
pub mod extract;
pub mod inject;
pub mod stream;

pub use error::ToolTranslationError;
pub use extract::{extract, generate_tool_call_id, ExtractedToolCalls};
pub use inject::inject;
pub use stream::ToolCallStreamRewriter;

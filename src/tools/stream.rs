//! Streaming tool-call rewriter.
//!
//! When `tools` is set and `stream=true`, the proxy core feeds every backend
//! chunk through this buffer instead of forwarding bytes directly (see
//! `api::completions::create_sse_stream`). Extraction only happens once the
//! backend signals end-of-stream, since a partial JSON envelope can't be
//! told apart from ordinary prose mid-stream.

use crate::api::types::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, FunctionCallDelta, ToolCallDelta,
};
use crate::tools::error::ToolTranslationError;
use crate::tools::extract::{self, ExtractedToolCalls};

pub struct ToolCallStreamRewriter {
    buffer: String,
    id: String,
    object: String,
    created: i64,
    model: String,
}

impl ToolCallStreamRewriter {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            id: String::new(),
            object: "chat.completion.chunk".to_string(),
            created: 0,
            model: String::new(),
        }
    }

    /// Feeds one backend chunk into the buffer. Returns `true` once a
    /// choice in this chunk carries a `finish_reason`, signalling the
    /// caller should call `finish()`.
    pub fn accumulate(&mut self, chunk: &ChatCompletionChunk) -> bool {
        if self.id.is_empty() {
            self.id = chunk.id.clone();
        }
        if self.model.is_empty() {
            self.model = chunk.model.clone();
        }
        if self.created == 0 {
            self.created = chunk.created;
        }
        let mut ended = false;
        for choice in &chunk.choices {
            if let Some(content) = &choice.delta.content {
                self.buffer.push_str(content);
            }
            if choice.finish_reason.is_some() {
                ended = true;
            }
        }
        ended
    }

    /// Renders the chunks to actually send to the client: a rewritten
    /// tool-call sequence if the buffered content parses as one, otherwise
    /// the buffered text forwarded as a single ordinary delta chunk.
    pub fn finish(self) -> Result<Vec<ChatCompletionChunk>, ToolTranslationError> {
        match extract::extract(&self.buffer) {
            Some(Ok(extracted)) => Ok(self.render_tool_call_chunks(extracted)),
            Some(Err(err)) => Err(err),
            None => Ok(self.render_plain_chunks()),
        }
    }

    fn render_tool_call_chunks(&self, extracted: ExtractedToolCalls) -> Vec<ChatCompletionChunk> {
        let mut chunks: Vec<ChatCompletionChunk> = extracted
            .tool_calls
            .iter()
            .enumerate()
            .map(|(index, call)| {
                self.delta_chunk(ChunkDelta {
                    role: if index == 0 {
                        Some("assistant".to_string())
                    } else {
                        None
                    },
                    content: None,
                    tool_calls: Some(vec![ToolCallDelta {
                        index: index as u32,
                        id: Some(call.id.clone()),
                        call_type: Some(call.call_type.clone()),
                        function: Some(FunctionCallDelta {
                            name: Some(call.function.name.clone()),
                            arguments: Some(call.function.arguments.clone()),
                        }),
                    }]),
                })
            })
            .collect();
        chunks.push(self.terminal_chunk("tool_calls"));
        chunks
    }

    fn render_plain_chunks(&self) -> Vec<ChatCompletionChunk> {
        let mut chunks = Vec::new();
        if !self.buffer.is_empty() {
            chunks.push(self.delta_chunk(ChunkDelta {
                role: Some("assistant".to_string()),
                content: Some(self.buffer.clone()),
                tool_calls: None,
            }));
        }
        chunks.push(self.terminal_chunk("stop"));
        chunks
    }

    fn delta_chunk(&self, delta: ChunkDelta) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: self.object.clone(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
        }
    }

    fn terminal_chunk(&self, finish_reason: &str) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: self.object.clone(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: None,
                    tool_calls: None,
                },
                finish_reason: Some(finish_reason.to_string()),
            }],
        }
    }
}

impl Default for ToolCallStreamRewriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_chunk(content: &str, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: "chatcmpl-1".to_string(),
            object: "chat.completion.chunk".to_string(),
            created: 1700000000,
            model: "gpt-oss-120b".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: Some(content.to_string()),
                    tool_calls: None,
                },
                finish_reason: finish_reason.map(|s| s.to_string()),
            }],
        }
    }

    #[test]
    fn test_passthrough_when_no_tool_call_detected() {
        let mut rewriter = ToolCallStreamRewriter::new();
        assert!(!rewriter.accumulate(&content_chunk("The answer is ", None)));
        assert!(rewriter.accumulate(&content_chunk("4", Some("stop"))));
        let chunks = rewriter.finish().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].choices[0].delta.content.as_deref(),
            Some("The answer is 4")
        );
        assert_eq!(chunks[1].choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_rewrites_fragmented_tool_call_into_single_fragment() {
        let mut rewriter = ToolCallStreamRewriter::new();
        rewriter.accumulate(&content_chunk("```json\n{\"tool_calls\":[{\"id\":", None));
        rewriter.accumulate(&content_chunk(
            "\"call_abc\",\"type\":\"function\",\"function\":{\"name\":\"read_file\",",
            None,
        ));
        let ended = rewriter.accumulate(&content_chunk(
            "\"arguments\":\"{\\\"path\\\":\\\"/tmp/a\\\"}\"}}]}\n```",
            Some("stop"),
        ));
        assert!(ended);
        let chunks = rewriter.finish().unwrap();
        assert_eq!(chunks.len(), 2);
        let tool_calls = chunks[0].choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls[0].id.as_deref(), Some("call_abc"));
        assert_eq!(
            tool_calls[0].function.as_ref().unwrap().arguments.as_deref(),
            Some("{\"path\":\"/tmp/a\"}")
        );
        assert_eq!(
            chunks[1].choices[0].finish_reason.as_deref(),
            Some("tool_calls")
        );
    }

    #[test]
    fn test_malformed_tool_call_surfaces_error() {
        let mut rewriter = ToolCallStreamRewriter::new();
        rewriter.accumulate(&content_chunk(
            "```json\n{\"tool_calls\": not json\n```",
            Some("stop"),
        ));
        assert!(rewriter.finish().is_err());
    }
}

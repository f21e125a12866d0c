//! Request-side tool translation: injects a tool-prompt system message,
//! strips the fields backends reject, and rewrites `role=tool` replies.

use crate::api::types::{ChatCompletionRequest, ChatMessage, ContentPart, MessageContent, ToolDefinition};
use crate::config::ToolRoleMode;

const ENVELOPE_INSTRUCTION: &str = "When you need to call one of these functions, respond with \
exactly one JSON object of the shape {\"tool_calls\":[{\"id\":\"call_<id>\",\"type\":\"function\",\
\"function\":{\"name\":\"<function name>\",\"arguments\":\"<JSON-encoded string of arguments>\"}}]} \
and nothing else. `arguments` must be a JSON-encoded string, not a nested object. If no function \
call is needed, respond normally in plain text.";

/// Rewrites a request so a plain-chat backend can stand in for tool calling.
/// Returns the request unchanged (aside from clearing the tool fields, which
/// is a no-op when `tools` was already absent) when `tools` is empty.
pub fn inject(request: &ChatCompletionRequest, tool_role_mode: ToolRoleMode) -> ChatCompletionRequest {
    let mut out = request.clone();
    out.tools = None;
    out.tool_choice = None;
    out.parallel_tool_calls = None;
    out.stream_options = None;

    if !request.has_tools() {
        return out;
    }

    let tools = request.tools.as_ref().expect("has_tools checked Some");
    out.messages = rewrite_tool_messages(&request.messages, tool_role_mode);
    merge_system_prompt(&mut out.messages, build_tool_prompt(tools));
    out
}

fn build_tool_prompt(tools: &[ToolDefinition]) -> String {
    let mut block = String::from("You have access to the following functions:\n\n");
    for tool in tools {
        let f = &tool.function;
        block.push_str(&format!("- {}", f.name));
        if let Some(description) = &f.description {
            block.push_str(&format!(": {}", description));
        }
        block.push('\n');
        if let Some(parameters) = &f.parameters {
            block.push_str(&format!("  parameters: {}\n", parameters));
        }
    }
    block.push('\n');
    block.push_str(ENVELOPE_INSTRUCTION);
    block
}

fn merge_system_prompt(messages: &mut Vec<ChatMessage>, block: String) {
    if let Some(first) = messages.first_mut() {
        if first.role == "system" {
            match &mut first.content {
                MessageContent::Text { content } => {
                    content.push_str("\n\n");
                    content.push_str(&block);
                }
                MessageContent::Parts { content } => {
                    content.push(ContentPart {
                        part_type: "text".to_string(),
                        text: Some(block),
                        image_url: None,
                    });
                }
                MessageContent::Null { .. } => {
                    first.content = MessageContent::Text { content: block };
                }
            }
            return;
        }
    }
    messages.insert(
        0,
        ChatMessage {
            role: "system".to_string(),
            content: MessageContent::Text { content: block },
            name: None,
            tool_calls: None,
            tool_call_id: None,
        },
    );
}

fn rewrite_tool_messages(messages: &[ChatMessage], mode: ToolRoleMode) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| {
            if m.role == "tool" {
                match mode {
                    ToolRoleMode::AsTool => m.clone(),
                    ToolRoleMode::AsUser => wrap_tool_reply_as_user(m),
                }
            } else {
                m.clone()
            }
        })
        .collect()
}

fn wrap_tool_reply_as_user(message: &ChatMessage) -> ChatMessage {
    let result_text = match &message.content {
        MessageContent::Text { content } => content.clone(),
        MessageContent::Parts { content } => content
            .iter()
            .filter_map(|p| p.text.clone())
            .collect::<Vec<_>>()
            .join("\n"),
        MessageContent::Null { .. } => String::new(),
    };
    let tool_call_id = message.tool_call_id.clone().unwrap_or_default();
    ChatMessage {
        role: "user".to_string(),
        content: MessageContent::Text {
            content: format!("Tool result for call {}:\n{}", tool_call_id, result_text),
        },
        name: None,
        tool_calls: None,
        tool_call_id: None,
    }
}

use crate::conversation::AssistantContent;
use crate::provider::LlmError;
use crate::tool::ToolCall;
use serde::{Deserialize, Serialize};

/// Events emitted during LLM responses.
/// Provider-agnostic; translated from the wire format in the provider layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StreamEvent {
    /// A chunk of text from the assistant
    TextDelta {
        text: String,
    },
    /// Start of a tool call (LLM wants to execute a tool)
    ToolCallStart {
        id: String,
        name: String,
    },
    /// Incremental JSON argument data for a tool call
    ToolCallDelta {
        id: String,
        arguments_delta: String,
    },
    /// Tool call arguments are complete
    ToolCallEnd {
        id: String,
    },
    /// The entire message is complete
    MessageEnd {
        stop_reason: StopReason,
    },
    /// An error occurred during streaming
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Normal end of response
    EndTurn,
    /// Model wants to use tools
    ToolUse,
    /// Hit max tokens limit
    MaxTokens,
    /// Stopped by stop sequence
    StopSequence,
}

/// Fold one model response into text and tool calls.
///
/// Argument deltas are concatenated per call id and parsed as JSON when the call
/// ends. An `Error` event fails the whole response.
pub fn assemble(events: impl IntoIterator<Item = StreamEvent>) -> Result<AssistantContent, LlmError> {
    let mut text = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    let mut pending: Vec<(String, String, String)> = Vec::new();

    for event in events {
        match event {
            StreamEvent::TextDelta { text: delta } => text.push_str(&delta),
            StreamEvent::ToolCallStart { id, name } => pending.push((id, name, String::new())),
            StreamEvent::ToolCallDelta { id, arguments_delta } => {
                if let Some(entry) = pending.iter_mut().find(|(pid, _, _)| *pid == id) {
                    entry.2.push_str(&arguments_delta);
                }
            }
            StreamEvent::ToolCallEnd { id } => {
                let Some(pos) = pending.iter().position(|(pid, _, _)| *pid == id) else {
                    continue;
                };
                let (id, name, args) = pending.remove(pos);
                let input = if args.trim().is_empty() {
                    serde_json::Value::Object(Default::default())
                } else {
                    serde_json::from_str(&args).map_err(|e| {
                        LlmError::InvalidResponse(format!("malformed arguments for {}: {}", name, e))
                    })?
                };
                tool_calls.push(ToolCall { id, name, input });
            }
            StreamEvent::MessageEnd { .. } => {}
            StreamEvent::Error { message } => return Err(LlmError::StreamError(message)),
        }
    }

    Ok(AssistantContent {
        text: (!text.is_empty()).then_some(text),
        tool_calls,
    })
}

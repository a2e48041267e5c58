//! Parsing of `streamGenerateContent` SSE payloads.

use serde_json::Value;
use tracing::trace;

use pathfinder_tool_runtime::provider::LlmError;
use pathfinder_tool_runtime::stream::{StopReason, StreamEvent};

/// Per-response state: Gemini does not always id its function calls, and the
/// stop reason depends on whether any call was seen.
#[derive(Debug, Default)]
pub(super) struct ChunkParser {
    calls_seen: usize,
}

impl ChunkParser {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Parse one `data:` payload into zero or more [`StreamEvent`]s.
    ///
    /// A `MALFORMED_FUNCTION_CALL` finish is reported as an error rather than an
    /// event so the caller abandons the response.
    pub(super) fn parse(&mut self, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        let parsed: Value = serde_json::from_str(data)
            .map_err(|e| LlmError::InvalidResponse(format!("bad stream chunk: {}", e)))?;

        let mut events = Vec::new();

        if let Some(message) = parsed["error"]["message"].as_str() {
            events.push(StreamEvent::Error {
                message: message.to_string(),
            });
            return Ok(events);
        }

        if let Some(reason) = parsed["promptFeedback"]["blockReason"].as_str() {
            events.push(StreamEvent::Error {
                message: format!("prompt blocked: {}", reason),
            });
            return Ok(events);
        }

        let candidate = &parsed["candidates"][0];
        for part in candidate["content"]["parts"].as_array().into_iter().flatten() {
            if part["thought"].as_bool() == Some(true) {
                continue;
            }
            if let Some(text) = part["text"].as_str() {
                if !text.is_empty() {
                    events.push(StreamEvent::TextDelta {
                        text: text.to_string(),
                    });
                }
            } else if let Some(call) = part.get("functionCall") {
                let name = call["name"].as_str().unwrap_or_default().to_string();
                let id = call["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{}_{}", self.calls_seen, name));
                let args = match &call["args"] {
                    Value::Null => "{}".to_string(),
                    args => args.to_string(),
                };
                self.calls_seen += 1;
                events.push(StreamEvent::ToolCallStart {
                    id: id.clone(),
                    name,
                });
                events.push(StreamEvent::ToolCallDelta {
                    id: id.clone(),
                    arguments_delta: args,
                });
                events.push(StreamEvent::ToolCallEnd { id });
            }
        }

        match candidate["finishReason"].as_str() {
            None | Some("FINISH_REASON_UNSPECIFIED") => {}
            Some("MALFORMED_FUNCTION_CALL") => {
                let detail = candidate["finishMessage"]
                    .as_str()
                    .unwrap_or("MALFORMED_FUNCTION_CALL");
                return Err(LlmError::MalformedCall(detail.to_string()));
            }
            Some("MAX_TOKENS") => events.push(StreamEvent::MessageEnd {
                stop_reason: StopReason::MaxTokens,
            }),
            Some(other) => {
                if other != "STOP" {
                    trace!(finish_reason = other, "treating finish reason as end of turn");
                }
                let stop_reason = if self.calls_seen > 0 {
                    StopReason::ToolUse
                } else {
                    StopReason::EndTurn
                };
                events.push(StreamEvent::MessageEnd { stop_reason });
            }
        }

        Ok(events)
    }
}

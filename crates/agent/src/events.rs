//! Progress events emitted during a chat turn.
//!
//! Events flow from the turn producer through an [`EventSink`] to whatever
//! transport the client is connected on (SSE or WebSocket).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::AgentError;

const PARAM_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Thinking {
        step: String,
        timestamp: DateTime<Utc>,
    },
    ToolCall {
        tool_name: String,
        parameters: Value,
        status: ToolCallStatus,
    },
    Chunk {
        content: String,
    },
    Complete {
        message_id: String,
        full_content: String,
    },
    SessionCreated {
        session_id: String,
    },
    Error {
        message: String,
        details: Option<String>,
    },
}

impl ChatEvent {
    pub fn thinking(step: impl Into<String>) -> Self {
        Self::Thinking {
            step: step.into(),
            timestamp: Utc::now(),
        }
    }

    /// Tool call progress; parameters are sanitized before they leave the server.
    pub fn tool_call(name: &str, params: &Value, status: ToolCallStatus) -> Self {
        Self::ToolCall {
            tool_name: name.to_string(),
            parameters: sanitize_parameters(params),
            status,
        }
    }

    pub fn chunk(content: impl Into<String>) -> Self {
        Self::Chunk {
            content: content.into(),
        }
    }

    /// `complete` and `error` end a turn's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::ToolCall { .. } => "tool_call",
            Self::Chunk { .. } => "chunk",
            Self::Complete { .. } => "complete",
            Self::SessionCreated { .. } => "session_created",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"type": "error", "message": e.to_string(), "details": null})
        })
    }

    /// WebSocket clients see `response_chunk` / `response_complete` instead
    /// of `chunk` / `complete`; chunks also carry `is_final: false`.
    pub fn to_ws_json(&self) -> Value {
        let mut value = self.to_json();
        let renamed = match self {
            Self::Chunk { .. } => Some("response_chunk"),
            Self::Complete { .. } => Some("response_complete"),
            _ => None,
        };
        if let (Some(name), Value::Object(obj)) = (renamed, &mut value) {
            obj.insert("type".into(), Value::from(name));
            if matches!(self, Self::Chunk { .. }) {
                obj.insert("is_final".into(), Value::Bool(false));
            }
        }
        value
    }
}

/// Client-safe view of tool arguments: long strings clipped, collections summarised.
pub fn sanitize_parameters(params: &Value) -> Value {
    let Value::Object(obj) = params else {
        return Value::Object(Map::new());
    };
    obj.iter()
        .map(|(key, value)| {
            let shown = match value {
                Value::String(s) if s.chars().count() > PARAM_PREVIEW_CHARS => {
                    let head: String = s.chars().take(PARAM_PREVIEW_CHARS).collect();
                    Value::String(format!("{}...", head))
                }
                Value::Array(items) => Value::String(format!("[{} items]", items.len())),
                Value::Object(inner) => Value::String(format!("{{dict with {} keys}}", inner.len())),
                other => other.clone(),
            };
            (key.clone(), shown)
        })
        .collect::<Map<_, _>>()
        .into()
}

/// Producer half of a turn's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ChatEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<ChatEvent>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn emit(&self, event: ChatEvent) -> Result<(), AgentError> {
        self.tx.send(event).await.map_err(|_| AgentError::Disconnected)
    }
}

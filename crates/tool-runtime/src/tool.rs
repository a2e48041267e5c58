use async_trait::async_trait;
use pathfinder_core::{DataError, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Broad kind of a tool, used when a result has to be summarised without the model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolFamily {
    /// Read-only data lookups.
    #[default]
    Query,
    /// Side-by-side comparison of several colleges.
    Comparison,
    /// Sends an email; side-effecting, never retried.
    Email,
}

/// Describes a tool's interface for LLM consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "get_colleges_by_rank")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// JSON Schema describing the expected input
    pub input_schema: Value,
    #[serde(default)]
    pub family: ToolFamily,
}

/// Represents an LLM requesting execution of a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique ID for this invocation (used to match results)
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// JSON input arguments
    pub input: Value,
}

/// Tool output fed back to the LLM as a function response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Must match the ToolCall id
    pub tool_call_id: String,
    pub name: String,
    /// Structured payload, `{"result": ...}` or `{"error": ...}`
    pub response: Value,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(call: &ToolCall, result: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            response: serde_json::json!({ "result": result }),
            is_error: false,
        }
    }

    pub fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            response: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }
}

/// Uniform envelope every tool returns.
///
/// Serialises as `{success, data, summary, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Envelope", from = "Envelope")]
pub enum ToolCallResult {
    Success { data: Value, summary: String },
    Failure { error: String, summary: String },
}

impl ToolCallResult {
    pub fn success(data: impl Serialize, summary: impl Into<String>) -> Self {
        Self::Success {
            data: serde_json::to_value(data).unwrap_or(Value::Null),
            summary: summary.into(),
        }
    }

    pub fn failure(error: impl Into<String>, summary: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            summary: summary.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn summary(&self) -> &str {
        match self {
            Self::Success { summary, .. } | Self::Failure { summary, .. } => summary,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    error: Option<String>,
}

impl From<ToolCallResult> for Envelope {
    fn from(result: ToolCallResult) -> Self {
        match result {
            ToolCallResult::Success { data, summary } => Envelope {
                success: true,
                data,
                summary,
                error: None,
            },
            ToolCallResult::Failure { error, summary } => Envelope {
                success: false,
                data: Value::Null,
                summary,
                error: Some(error),
            },
        }
    }
}

impl From<Envelope> for ToolCallResult {
    fn from(env: Envelope) -> Self {
        if env.success {
            ToolCallResult::Success {
                data: env.data,
                summary: env.summary,
            }
        } else {
            ToolCallResult::Failure {
                error: env.error.unwrap_or_default(),
                summary: env.summary,
            }
        }
    }
}

/// Per-invocation context. Session-aware tools read the caller's session from here
/// instead of from arguments the model would have to supply.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session: Session,
    pub frontend_base_url: String,
}

impl ToolContext {
    pub fn new(session: Session, frontend_base_url: impl Into<String>) -> Self {
        Self {
            session,
            frontend_base_url: frontend_base_url.into(),
        }
    }

    /// Link back to this conversation in the web app.
    pub fn chat_url(&self) -> String {
        format!(
            "{}/ai-chat?session={}",
            self.frontend_base_url.trim_end_matches('/'),
            self.session.id
        )
    }

    pub fn authenticated_email(&self) -> Option<&str> {
        self.session.owner_email.as_deref().filter(|e| !e.is_empty())
    }
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, JSON Schema).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with already-validated JSON input.
    async fn execute(&self, input: Value, context: &ToolContext)
        -> Result<ToolCallResult, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

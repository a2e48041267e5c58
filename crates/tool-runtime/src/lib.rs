//! Tool calling for the counselor agent.
//!
//! - `tool` / `registry` / `schema`: the uniform tool surface and its executor
//! - `tools`: college data lookups and report emails
//! - `provider` / `conversation` / `stream`: provider-agnostic model plumbing

pub mod conversation;
pub mod provider;
pub mod registry;
pub mod schema;
pub mod stream;
pub mod tool;
pub mod tools;

pub use conversation::{AssistantContent, Conversation, ConversationMessage};
pub use provider::{LlmError, ToolAwareLlmProvider};
pub use registry::{RegistryError, ToolRegistry};
pub use stream::{StopReason, StreamEvent};
pub use tool::{Tool, ToolCall, ToolCallResult, ToolContext, ToolDefinition, ToolError, ToolFamily, ToolResult};
pub use tools::{counselor_registry, EmailDeps};

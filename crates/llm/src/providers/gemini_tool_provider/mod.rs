//! Gemini implementation of [`ToolAwareLlmProvider`].
//!
//! Streams `streamGenerateContent` over SSE and translates between the Gemini
//! `contents`/`functionDeclarations` format and the provider-agnostic
//! [`StreamEvent`] / [`ConversationMessage`] types.
//!
//! [`ToolAwareLlmProvider`]: pathfinder_tool_runtime::ToolAwareLlmProvider
//! [`StreamEvent`]: pathfinder_tool_runtime::StreamEvent
//! [`ConversationMessage`]: pathfinder_tool_runtime::ConversationMessage

mod sse;
mod streaming;
mod translate;

pub use self::streaming::GeminiToolProvider;

#[cfg(test)]
mod tests;

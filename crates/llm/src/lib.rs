pub mod provider;
pub mod providers;

pub use provider::{LlmError, LlmProvider, Message, Role};
pub use providers::gemini::GeminiProvider;
pub use providers::gemini_tool_provider::GeminiToolProvider;
pub use providers::{create_intent_provider, create_provider};

pub mod gemini;
pub mod gemini_tool_provider;

use std::sync::Arc;

use pathfinder_core::config::LlmConfig;
use pathfinder_tool_runtime::ToolAwareLlmProvider;

use crate::provider::{LlmError, LlmProvider};

fn api_key(llm_config: &LlmConfig) -> Result<String, LlmError> {
    llm_config
        .api_key
        .clone()
        .ok_or_else(|| LlmError::NotConfigured("GEMINI_API_KEY not set".into()))
}

/// Create the tool-calling provider that drives the counselor conversation.
pub fn create_provider(llm_config: &LlmConfig) -> Result<Arc<dyn ToolAwareLlmProvider>, LlmError> {
    let provider = gemini_tool_provider::GeminiToolProvider::new(
        api_key(llm_config)?,
        llm_config.model.clone(),
        llm_config.base_url.clone(),
        llm_config.timeout(),
    )?;
    Ok(Arc::new(provider))
}

/// Create the JSON-mode provider used for intent extraction.
pub fn create_intent_provider(llm_config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = gemini::GeminiProvider::new(
        api_key(llm_config)?,
        llm_config.intent_model.clone(),
        llm_config.base_url.clone(),
        llm_config.timeout(),
    )?
    .with_json_output();
    Ok(Arc::new(provider))
}

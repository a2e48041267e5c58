//! The tool-calling counselor loop.
//!
//! Flow: history + message → model → tool calls → execute → results → model
//! → ... → final text. Every model call is bounded by a timeout, and when a
//! call fails after a tool already succeeded the answer is synthesized from
//! that result instead of apologising.

use std::sync::Arc;
use std::time::Duration;

use pathfinder_core::{MessageRole, Session};
use pathfinder_tool_runtime::stream::assemble;
use pathfinder_tool_runtime::{
    AssistantContent, Conversation, LlmError, ToolAwareLlmProvider, ToolCallResult, ToolContext,
    ToolDefinition, ToolFamily, ToolRegistry, ToolResult,
};
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::events::{ChatEvent, EventSink, ToolCallStatus};
use crate::prompts::{
    tool_call_message, EMPTY_ANSWER, ERROR_MESSAGE, EXHAUSTED_MESSAGE, SYSTEM_PROMPT,
    UNDERSTANDING_STEP,
};
use crate::synthesis::synthesize;
use crate::truncate::truncate_tool_response;

/// Approximate token ceiling for the replayed conversation.
const CONTEXT_TOKENS: usize = 32_000;

/// How a turn's answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The model wrote the final text.
    Answered,
    /// Built from the last successful tool result.
    Synthesized,
    /// Generic apology; nothing usable was produced.
    Apologized,
    /// The iteration ceiling was reached.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    pub outcome: Outcome,
    pub iterations: usize,
}

pub struct Counselor {
    provider: Arc<dyn ToolAwareLlmProvider>,
    registry: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: usize,
    history_limit: usize,
    temperature: f32,
    max_tokens: u32,
    model_timeout: Duration,
    frontend_base_url: String,
}

impl Counselor {
    pub fn new(provider: Arc<dyn ToolAwareLlmProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
            history_limit: 5,
            temperature: 0.7,
            max_tokens: 2048,
            model_timeout: Duration::from_secs(60),
            frontend_base_url: String::new(),
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_frontend_base_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_base_url = url.into();
        self
    }

    /// Answer `message` in the context of `session`, reporting progress to `sink`.
    ///
    /// Only a vanished event consumer is an error; model and tool failures
    /// degrade into a synthesized answer or an apology.
    pub async fn run(
        &self,
        message: &str,
        session: &Session,
        sink: &EventSink,
    ) -> Result<AgentReply, AgentError> {
        let ctx = ToolContext::new(session.clone(), self.frontend_base_url.clone());
        let mut conversation = self.seed_conversation(message, session);
        let tools = self.registry.list();
        let mut last_success: Option<(ToolFamily, ToolCallResult)> = None;

        sink.emit(ChatEvent::thinking(UNDERSTANDING_STEP)).await?;

        for iteration in 1..=self.max_iterations {
            debug!(iteration, provider = self.provider.provider_name(), "counselor iteration");

            let content = match self.call_model(&conversation, &tools).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(iteration, error = %e, "model call failed");
                    return Ok(fallback(last_success.as_ref(), ERROR_MESSAGE, iteration));
                }
            };

            if content.tool_calls.is_empty() {
                let text = content.text.unwrap_or_default();
                if text.trim().is_empty() {
                    return Ok(fallback(last_success.as_ref(), EMPTY_ANSWER, iteration));
                }
                info!(iteration, "counselor answered");
                return Ok(AgentReply {
                    text,
                    outcome: Outcome::Answered,
                    iterations: iteration,
                });
            }

            let calls = content.tool_calls.clone();
            conversation.add_assistant_response(content);

            for call in &calls {
                sink.emit(ChatEvent::thinking(tool_call_message(&call.name, &call.input)))
                    .await?;
                sink.emit(ChatEvent::tool_call(&call.name, &call.input, ToolCallStatus::Started))
                    .await?;

                let result = self.registry.execute(&call.name, call.input.clone(), &ctx).await;
                let family = self.registry.family(&call.name).unwrap_or_default();

                let status = if result.is_success() {
                    ToolCallStatus::Completed
                } else {
                    ToolCallStatus::Failed
                };
                sink.emit(ChatEvent::tool_call(&call.name, &call.input, status)).await?;
                sink.emit(ChatEvent::thinking(format!("✅ {}", result.summary()))).await?;

                let response = match &result {
                    ToolCallResult::Success { data, .. } => {
                        ToolResult::ok(call, truncate_tool_response(data.clone(), family))
                    }
                    ToolCallResult::Failure { error, .. } => ToolResult::error(call, error.clone()),
                };
                conversation.add_tool_result(response);

                if result.is_success() {
                    last_success = Some((family, result));
                }
            }
        }

        warn!(max_iterations = self.max_iterations, "iteration ceiling reached");
        Ok(AgentReply {
            text: EXHAUSTED_MESSAGE.to_string(),
            outcome: Outcome::Exhausted,
            iterations: self.max_iterations,
        })
    }

    /// Recent session history (thinking and system entries skipped), then the message.
    fn seed_conversation(&self, message: &str, session: &Session) -> Conversation {
        let mut conversation =
            Conversation::new(CONTEXT_TOKENS).with_system_prompt(self.system_prompt.clone());

        let mut history: Vec<_> = session
            .get_recent_messages(self.history_limit)
            .iter()
            .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
            .collect();
        // The session usually already holds the current message.
        if history
            .last()
            .is_some_and(|m| m.role == MessageRole::User && m.content == message)
        {
            history.pop();
        }

        for entry in history {
            match entry.role {
                MessageRole::User => conversation.add_user_message(entry.content.clone()),
                _ => conversation.add_assistant_response(AssistantContent::text(entry.content.clone())),
            }
        }
        conversation.add_user_message(message);
        conversation
    }

    async fn call_model(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<AssistantContent, LlmError> {
        let request = async {
            let events = self
                .provider
                .complete_with_tools(
                    conversation.messages().to_vec(),
                    conversation.system_prompt().map(String::from),
                    tools.to_vec(),
                    self.temperature,
                    self.max_tokens,
                )
                .await?;
            assemble(events)
        };
        tokio::time::timeout(self.model_timeout, request)
            .await
            .map_err(|_| LlmError::Timeout(self.model_timeout))?
    }
}

fn fallback(
    last_success: Option<&(ToolFamily, ToolCallResult)>,
    apology: &str,
    iterations: usize,
) -> AgentReply {
    match last_success {
        Some((family, result)) => AgentReply {
            text: synthesize(*family, result),
            outcome: Outcome::Synthesized,
            iterations,
        },
        None => AgentReply {
            text: apology.to_string(),
            outcome: Outcome::Apologized,
            iterations,
        },
    }
}

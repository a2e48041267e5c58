use crate::conversation::ConversationMessage;
use crate::stream::StreamEvent;
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Trait for LLM providers that support tool use.
///
/// This trait lives in tool-runtime (not in crates/llm) because it's
/// defined by the consumer (the agent loop), not the provider.
/// Implementations live in crates/llm.
#[async_trait]
pub trait ToolAwareLlmProvider: Send + Sync {
    /// Stream a response from the LLM with tool definitions available.
    async fn stream_with_tools(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<EventStream, LlmError>;

    /// Non-streaming convenience: collects the full response.
    async fn complete_with_tools(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Vec<StreamEvent>, LlmError> {
        use futures::StreamExt;
        let stream = self
            .stream_with_tools(messages, system_prompt, tools, temperature, max_tokens)
            .await?;
        let events: Vec<_> = stream
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Provider name for logging/debugging (e.g., "gemini", "mock")
    fn provider_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The model emitted a function call it could not complete.
    #[error("Malformed function call: {0}")]
    MalformedCall(String),
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Authentication failed")]
    AuthError,
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Mock LLM provider for testing the agent loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::stream::StopReason;
    use futures::stream;
    use std::sync::Mutex;

    enum Scripted {
        Events(Vec<StreamEvent>),
        Fail(String),
        Stall,
    }

    /// A mock provider that returns pre-configured responses.
    ///
    /// Responses are popped from the back of the queue, so queue the *last*
    /// expected response first.
    pub struct MockLlmProvider {
        responses: Mutex<Vec<Scripted>>,
        fallback: Mutex<Option<Vec<StreamEvent>>>,
        requests: Mutex<Vec<Vec<ConversationMessage>>>,
    }

    impl MockLlmProvider {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
                fallback: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Queue a response that will be returned on the next call.
        pub fn queue_response(&self, events: Vec<StreamEvent>) {
            self.responses.lock().unwrap().push(Scripted::Events(events));
        }

        /// Queue a simple text response.
        pub fn queue_text(&self, text: &str) {
            self.queue_response(vec![
                StreamEvent::TextDelta {
                    text: text.to_string(),
                },
                StreamEvent::MessageEnd {
                    stop_reason: StopReason::EndTurn,
                },
            ]);
        }

        /// Queue a single tool call request.
        pub fn queue_tool_call(&self, name: &str, args: serde_json::Value) {
            self.queue_response(tool_call_events(name, args));
        }

        /// Queue a call that fails before producing any event.
        pub fn queue_error(&self, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push(Scripted::Fail(message.to_string()));
        }

        /// Queue a call that never resolves.
        pub fn queue_stall(&self) {
            self.responses.lock().unwrap().push(Scripted::Stall);
        }

        /// Response used whenever the queue is empty.
        pub fn always(&self, events: Vec<StreamEvent>) {
            *self.fallback.lock().unwrap() = Some(events);
        }

        /// Number of calls made so far.
        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        /// Messages sent on each call.
        pub fn requests(&self) -> Vec<Vec<ConversationMessage>> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Default for MockLlmProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    pub fn tool_call_events(name: &str, args: serde_json::Value) -> Vec<StreamEvent> {
        let id = format!("call_{}", name);
        vec![
            StreamEvent::ToolCallStart {
                id: id.clone(),
                name: name.to_string(),
            },
            StreamEvent::ToolCallDelta {
                id: id.clone(),
                arguments_delta: args.to_string(),
            },
            StreamEvent::ToolCallEnd { id },
            StreamEvent::MessageEnd {
                stop_reason: StopReason::ToolUse,
            },
        ]
    }

    #[async_trait]
    impl ToolAwareLlmProvider for MockLlmProvider {
        async fn stream_with_tools(
            &self,
            messages: Vec<ConversationMessage>,
            _system_prompt: Option<String>,
            _tools: Vec<ToolDefinition>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<EventStream, LlmError> {
            self.requests.lock().unwrap().push(messages);
            let next = self.responses.lock().unwrap().pop();
            let events = match next {
                Some(Scripted::Events(events)) => events,
                Some(Scripted::Fail(message)) => return Err(LlmError::NetworkError(message)),
                Some(Scripted::Stall) => {
                    futures::future::pending::<()>().await;
                    Vec::new()
                }
                None => self.fallback.lock().unwrap().clone().unwrap_or_else(|| {
                    vec![StreamEvent::MessageEnd {
                        stop_reason: StopReason::EndTurn,
                    }]
                }),
            };
            Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }
}

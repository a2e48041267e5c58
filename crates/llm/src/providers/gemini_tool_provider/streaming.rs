//! [`ToolAwareLlmProvider`] trait implementation for the Gemini streaming API.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use tracing::{debug, warn};

use pathfinder_tool_runtime::{
    conversation::ConversationMessage,
    provider::{EventStream, LlmError, ToolAwareLlmProvider},
    stream::StreamEvent,
    tool::ToolDefinition,
};

use super::sse::ChunkParser;
use super::translate::{messages_to_gemini, tools_to_gemini};

/// Gemini provider with streaming function-calling support.
///
/// Uses `models/{model}:streamGenerateContent?alt=sse` to emit incremental
/// [`StreamEvent`]s that the counselor loop consumes.
pub struct GeminiToolProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiToolProvider {
    /// # Arguments
    /// * `api_key` - Gemini API key
    /// * `model` - Model name (e.g. `"gemini-2.0-flash"`)
    /// * `base_url` - API base URL (e.g. `"https://generativelanguage.googleapis.com"`)
    /// * `timeout` - whole-request timeout, stream included
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(super) fn build_request_body(
        messages: &[ConversationMessage],
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
        temperature: f32,
        max_tokens: u32,
    ) -> Value {
        let mut body = json!({
            "contents": messages_to_gemini(messages),
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        });

        if let Some(tools) = tools_to_gemini(tools) {
            body["tools"] = tools;
            body["toolConfig"] = json!({ "functionCallingConfig": { "mode": "AUTO" } });
        }

        if let Some(system) = system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        body
    }
}

#[async_trait]
impl ToolAwareLlmProvider for GeminiToolProvider {
    async fn stream_with_tools(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<EventStream, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        let body = Self::build_request_body(
            &messages,
            system_prompt.as_deref(),
            &tools,
            temperature,
            max_tokens,
        );

        debug!(model = %self.model, messages = messages.len(), tools = tools.len(), "starting Gemini streaming request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();

        if status != 200 {
            let body_text = response.text().await.unwrap_or_default();
            warn!(status, "Gemini request rejected");

            if status == 401 || status == 403 {
                return Err(LlmError::AuthError);
            }
            if status == 429 {
                return Err(LlmError::RateLimited {
                    retry_after_secs: 30,
                });
            }
            return Err(LlmError::ApiError {
                status,
                message: body_text,
            });
        }

        type ByteStream =
            Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

        struct State {
            bytes: ByteStream,
            buffer: String,
            parser: ChunkParser,
            pending: VecDeque<StreamEvent>,
            done: bool,
        }

        let state = State {
            bytes: Box::pin(response.bytes_stream()),
            buffer: String::new(),
            parser: ChunkParser::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let event_stream = stream::unfold(state, |mut state| async move {
            use futures::StreamExt;
            loop {
                if let Some(evt) = state.pending.pop_front() {
                    return Some((Ok(evt), state));
                }
                if state.done {
                    return None;
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        state.buffer.push_str(&String::from_utf8_lossy(&chunk));

                        // SSE lines are "data: {json}" separated by blank lines
                        while let Some(newline_pos) = state.buffer.find('\n') {
                            let line = state.buffer[..newline_pos]
                                .trim_end_matches('\r')
                                .to_string();
                            state.buffer.drain(..=newline_pos);

                            let Some(data) = line.strip_prefix("data:") else {
                                continue;
                            };
                            match state.parser.parse(data.trim_start()) {
                                Ok(events) => state.pending.extend(events),
                                Err(e) => {
                                    state.done = true;
                                    state.pending.clear();
                                    return Some((Err(e), state));
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        let err = if e.is_timeout() {
                            LlmError::NetworkError(format!("timed out: {}", e))
                        } else {
                            LlmError::StreamError(e.to_string())
                        };
                        return Some((Err(err), state));
                    }
                    None => {
                        state.done = true;
                        // A final payload without a trailing newline
                        let rest = std::mem::take(&mut state.buffer);
                        if let Some(data) = rest.trim().strip_prefix("data:") {
                            match state.parser.parse(data.trim_start()) {
                                Ok(events) => state.pending.extend(events),
                                Err(e) => return Some((Err(e), state)),
                            }
                        }
                    }
                }
            }
        });

        Ok(Box::pin(event_stream))
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

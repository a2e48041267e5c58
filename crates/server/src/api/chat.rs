//! Chat transports: one SSE response per turn, or a long-lived WebSocket.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use pathfinder_agent::prompts::WELCOME_MESSAGE;
use pathfinder_agent::{AgentError, Caller, ChatEvent, OpenedSession, TurnStream};
use pathfinder_core::Session;

use crate::error::ApiError;
use crate::state::AppState;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// `POST /chat/stream/{session_id}`: run one turn and stream its events.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AgentError::EmptyMessage.into());
    }

    let caller = state.auth.caller_from_headers(&headers);
    let opened = state.chat.open_session(&session_id, &caller).await?;
    info!(session = %session_id, authenticated = caller.user_id().is_some(), "sse turn");

    let turn = TurnStream::spawn(
        state.chat.clone(),
        opened.session,
        caller,
        message.to_string(),
        state.poll_interval(),
    );
    let events = turn
        .into_stream()
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json().to_string())));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// `GET /chat/ws/{session_id}?token=`
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(params): Query<WsParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id, params.token))
}

#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type", default = "default_frame_type")]
    kind: String,
    #[serde(default)]
    message: String,
}

fn default_frame_type() -> String {
    "chat_message".into()
}

fn parse_frame(text: &str) -> Result<ClientFrame, Value> {
    serde_json::from_str(text).map_err(|_| error_frame("Invalid JSON format"))
}

fn greeting(opened: &OpenedSession) -> Value {
    if opened.existing {
        json!({
            "type": "connected",
            "session_id": opened.session.id,
            "message_count": opened.session.messages.len(),
        })
    } else {
        json!({
            "type": "welcome",
            "message": WELCOME_MESSAGE,
            "session_id": opened.session.id,
        })
    }
}

fn history_frame(session: &Session) -> Value {
    json!({
        "type": "history",
        "session_id": session.id,
        "messages": session.messages,
    })
}

fn error_frame(message: &str) -> Value {
    ChatEvent::Error {
        message: message.to_string(),
        details: None,
    }
    .to_ws_json()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session_id: String, token: Option<String>) {
    let caller: Caller = state.auth.caller(token.as_deref());
    let (mut sender, mut receiver) = socket.split();

    let opened = match state.chat.open_session(&session_id, &caller).await {
        Ok(opened) => opened,
        Err(e) => {
            warn!(session = %session_id, error = %e, "websocket session rejected");
            let _ = sender
                .send(WsMessage::Text(error_frame(&e.to_string()).to_string().into()))
                .await;
            return;
        }
    };
    info!(session = %session_id, existing = opened.existing, "websocket connected");

    if sender
        .send(WsMessage::Text(greeting(&opened).to_string().into()))
        .await
        .is_err()
    {
        return;
    }
    let mut session = opened.session;

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let reply = match parse_frame(text.as_str()) {
            Err(error) => Some(error),
            Ok(frame) => match frame.kind.as_str() {
                "chat_message" => {
                    let message = frame.message.trim();
                    if message.is_empty() {
                        continue;
                    }
                    let mut turn = TurnStream::spawn(
                        state.chat.clone(),
                        session.clone(),
                        caller.clone(),
                        message.to_string(),
                        state.poll_interval(),
                    );
                    while let Some(event) = turn.next_event().await {
                        let payload = event.to_ws_json().to_string();
                        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                            debug!(session = %session.id, "websocket closed mid-turn");
                            return;
                        }
                    }
                    if let Some(updated) = turn.finish().await {
                        session = updated;
                    }
                    None
                }
                "get_history" => Some(history_frame(&session)),
                other => Some(error_frame(&format!("Unknown message type: {}", other))),
            },
        };

        if let Some(reply) = reply {
            if sender.send(WsMessage::Text(reply.to_string().into())).await.is_err() {
                break;
            }
        }
    }
    info!(session = %session.id, "websocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{Request, StatusCode};
    use pathfinder_core::Message;
    use pathfinder_tool_runtime::provider::mock::MockLlmProvider;
    use tower::ServiceExt;

    use crate::api::test_support::{app, app_with, body_bytes, body_json};
    use crate::auth::tests::token_for;

    const RANK_INTENT: &str =
        r#"{"intent": "colleges_by_rank", "rank": 10000, "limit": 5, "needs_llm_response": false}"#;

    fn stream_request(session_id: &str, message: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(format!("/chat/stream/{}", session_id))
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
            .body(Body::from(json!({ "message": message }).to_string()))
            .unwrap()
    }

    fn sse_events(bytes: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(bytes)
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (router, _) = app();
        let response = router.oneshot(stream_request("s-1", "   ", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Message cannot be empty");
    }

    #[tokio::test]
    async fn fast_path_turn_streams_over_sse() {
        let (router, state) = app_with(&[RANK_INTENT], Arc::new(MockLlmProvider::new()));
        let response = router
            .oneshot(stream_request("s-sse", "top 5 colleges for rank 10000", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let events = sse_events(&body_bytes(response).await);
        assert_eq!(events.first().unwrap()["type"], "thinking");
        let last = events.last().unwrap();
        assert_eq!(last["type"], "complete");
        let streamed: String = events
            .iter()
            .filter(|e| e["type"] == "chunk")
            .filter_map(|e| e["content"].as_str())
            .collect();
        assert_eq!(last["full_content"].as_str().unwrap(), streamed);

        let stored = state.sessions().get("s-sse", None).await.unwrap();
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn authenticated_temp_session_is_promoted_first() {
        let agent = Arc::new(MockLlmProvider::new());
        agent.queue_text("Hello! Ask me about KCET cutoffs.");
        let (router, state) = app_with(&[], agent);
        let token = token_for("user-9", Some("student@example.com"));

        let response = router
            .oneshot(stream_request("temp-123", "hello there", Some(&token)))
            .await
            .unwrap();
        let events = sse_events(&body_bytes(response).await);

        assert_eq!(events[0]["type"], "session_created");
        let new_id = events[0]["session_id"].as_str().unwrap();
        assert!(!new_id.starts_with("temp-"));
        assert_eq!(events.last().unwrap()["type"], "complete");

        let stored = state.sessions().get(new_id, Some("user-9")).await.unwrap();
        assert_eq!(stored.messages.len(), 2);
        assert!(state.sessions().get(new_id, Some("someone-else")).await.is_none());
    }

    #[test]
    fn frames_default_to_chat_messages() {
        let frame = parse_frame(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(frame.kind, "chat_message");
        assert_eq!(frame.message, "hi");

        let frame = parse_frame(r#"{"type": "get_history"}"#).unwrap();
        assert_eq!(frame.kind, "get_history");
        assert!(frame.message.is_empty());

        let error = parse_frame("not json").unwrap_err();
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "Invalid JSON format");
    }

    #[test]
    fn greeting_depends_on_whether_the_session_existed() {
        let mut session = Session::with_id("s-ws", None);
        let fresh = greeting(&OpenedSession {
            session: session.clone(),
            existing: false,
        });
        assert_eq!(fresh["type"], "welcome");
        assert_eq!(fresh["message"], WELCOME_MESSAGE);

        session.add_message(Message::user("rank 5000"));
        let resumed = greeting(&OpenedSession {
            session: session.clone(),
            existing: true,
        });
        assert_eq!(resumed["type"], "connected");
        assert_eq!(resumed["message_count"], 1);

        let history = history_frame(&session);
        assert_eq!(history["type"], "history");
        assert_eq!(history["messages"][0]["content"], "rank 5000");
    }
}

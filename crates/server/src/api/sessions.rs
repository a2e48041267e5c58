//! Chat session REST endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use pathfinder_core::{Message, Session, SessionSummary};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct SessionListResponse {
    pub count: usize,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    pub message_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct MessagesResponse {
    pub session_id: String,
    pub message_count: usize,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Serialize)]
pub struct RenameResponse {
    pub session_id: String,
    pub title: String,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    // The body is optional; an empty POST creates an untitled session.
    let request: CreateSessionRequest = if body.is_empty() {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    let caller = state.auth.caller_from_headers(&headers);
    let title = request.title.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let session = state.sessions().create(caller.user_id(), title).await;
    info!(session = %session.id, "session created");
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            created_at: session.created_at,
            message: "Session created successfully",
        }),
    ))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<SessionListResponse> {
    let caller = state.auth.caller_from_headers(&headers);
    let sessions = state.sessions().list(caller.user_id()).await;
    Json(SessionListResponse {
        count: sessions.len(),
        sessions,
    })
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SessionDetail>, ApiError> {
    let caller = state.auth.caller_from_headers(&headers);
    let session = state
        .sessions()
        .get(&id, caller.user_id())
        .await
        .ok_or_else(ApiError::session_not_found)?;
    Ok(Json(SessionDetail {
        message_count: session.messages.len(),
        session,
    }))
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
    headers: HeaderMap,
) -> Result<Json<MessagesResponse>, ApiError> {
    let caller = state.auth.caller_from_headers(&headers);
    if state.sessions().get(&id, caller.user_id()).await.is_none() {
        return Err(ApiError::session_not_found());
    }
    let messages = state.sessions().get_messages(&id, query.limit, caller.user_id()).await;
    Ok(Json(MessagesResponse {
        session_id: id,
        message_count: messages.len(),
        messages,
    }))
}

pub async fn rename_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RenameRequest>,
) -> Result<Json<RenameResponse>, ApiError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title cannot be empty".into()));
    }
    let caller = state.auth.caller_from_headers(&headers);
    let session = state
        .sessions()
        .rename(&id, title, caller.user_id())
        .await
        .ok_or_else(ApiError::session_not_found)?;
    Ok(Json(RenameResponse {
        session_id: session.id,
        title: session.title,
        message: "Session updated successfully",
    }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>, ApiError> {
    let caller = state.auth.caller_from_headers(&headers);
    if !state.sessions().delete(&id, caller.user_id()).await {
        return Err(ApiError::session_not_found());
    }
    info!(session = %id, "session deleted");
    Ok(Json(DeleteResponse {
        message: "Session deleted successfully",
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{Request, StatusCode};
    use pathfinder_core::Message;
    use tower::ServiceExt;

    use crate::api::test_support::{app, body_json};
    use crate::auth::tests::token_for;

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn create_then_fetch() {
        let (router, _) = app();
        let token = token_for("user-1", Some("student@example.com"));

        let response = router
            .clone()
            .oneshot(request("POST", "/chat/sessions", Some(&token), Some(r#"{"title": "My ranks"}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["message"], "Session created successfully");
        let id = created["session_id"].as_str().unwrap().to_string();

        let response = router
            .clone()
            .oneshot(request("GET", &format!("/chat/sessions/{}", id), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session = body_json(response).await;
        assert_eq!(session["session_id"], id.as_str());
        assert_eq!(session["title"], "My ranks");
        assert_eq!(session["message_count"], 0);

        let response = router
            .oneshot(request("GET", "/chat/sessions", Some(&token), None))
            .await
            .unwrap();
        let listing = body_json(response).await;
        assert_eq!(listing["count"], 1);
        assert_eq!(listing["sessions"][0]["session_id"], id.as_str());
    }

    #[tokio::test]
    async fn empty_body_creates_a_default_session() {
        let (router, state) = app();
        let response = router
            .oneshot(request("POST", "/chat/sessions", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["session_id"].as_str().unwrap().to_string();
        let session = state.sessions().get(&id, None).await.unwrap();
        assert_eq!(session.title, "New Chat");
    }

    #[tokio::test]
    async fn other_users_get_not_found() {
        let (router, state) = app();
        let session = state.sessions().create(Some("owner"), None).await;
        let intruder = token_for("intruder", None);

        for (method, body) in [("GET", None), ("DELETE", None), ("PATCH", Some(r#"{"title": "x"}"#))] {
            let response = router
                .clone()
                .oneshot(request(method, &format!("/chat/sessions/{}", session.id), Some(&intruder), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{} should be hidden", method);
            assert_eq!(body_json(response).await["error"], "Session not found");
        }
        assert!(state.sessions().get(&session.id, Some("owner")).await.is_some());
    }

    #[tokio::test]
    async fn anonymous_requests_cannot_reach_owned_sessions() {
        let (router, state) = app();
        let session = state.sessions().create(Some("owner"), None).await;
        state
            .sessions()
            .append_message(&session.id, Message::user("my rank is 5000"), Some("owner"))
            .await
            .unwrap();
        state.sessions().create(None, None).await;

        for (method, path) in [
            ("GET", format!("/chat/sessions/{}", session.id)),
            ("GET", format!("/chat/sessions/{}/messages", session.id)),
            ("DELETE", format!("/chat/sessions/{}", session.id)),
        ] {
            let response = router
                .clone()
                .oneshot(request(method, &path, None, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{} {}", method, path);
        }

        let response = router
            .oneshot(request("GET", "/chat/sessions", None, None))
            .await
            .unwrap();
        let listing = body_json(response).await;
        assert_eq!(listing["count"], 0);
        assert_eq!(state.sessions().get(&session.id, Some("owner")).await.unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn messages_respect_the_limit() {
        let (router, state) = app();
        let session = state.sessions().create(None, None).await;
        for text in ["one", "two", "three"] {
            state
                .sessions()
                .append_message(&session.id, Message::user(text), None)
                .await
                .unwrap();
        }

        let response = router
            .oneshot(request("GET", &format!("/chat/sessions/{}/messages?limit=2", session.id), None, None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["message_count"], 2);
        assert_eq!(body["messages"][1]["content"], "three");
    }

    #[tokio::test]
    async fn rename_and_delete() {
        let (router, state) = app();
        let session = state.sessions().create(None, None).await;
        let uri = format!("/chat/sessions/{}", session.id);

        let response = router
            .clone()
            .oneshot(request("PATCH", &uri, None, Some(r#"{"title": "  Renamed  "}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["title"], "Renamed");

        let response = router
            .clone()
            .oneshot(request("PATCH", &uri, None, Some(r#"{"title": "   "}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router.clone().oneshot(request("DELETE", &uri, None, None)).await.unwrap();
        assert_eq!(body_json(response).await["message"], "Session deleted successfully");

        let response = router.oneshot(request("DELETE", &uri, None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

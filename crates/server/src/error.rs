//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pathfinder_agent::{AgentError, SessionError};
use serde::Serialize;
use tracing::warn;

pub const GENERIC_ERROR: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    pub fn session_not_found() -> Self {
        Self::NotFound(SessionError::NotFound.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::EmptyMessage => Self::BadRequest(e.to_string()),
            AgentError::Session(SessionError::NotFound) => Self::session_not_found(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            Self::BadRequest(msg) | Self::NotFound(msg) => msg,
            Self::Internal(detail) => {
                warn!(error = %detail, "request failed");
                GENERIC_ERROR.to_string()
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

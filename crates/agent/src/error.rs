use thiserror::Error;

/// Failures of the session store.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Session backend error: {0}")]
    Backend(String),
}

/// Failures that end a chat turn without an answer.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Event consumer went away")]
    Disconnected,

    #[error("{0}")]
    Internal(String),
}

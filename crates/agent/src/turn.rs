//! One chat turn: session bookkeeping, fast path or agent, then streaming.

use std::sync::Arc;

use pathfinder_core::text::{chunk_chars, take_chars};
use pathfinder_core::{Config, Message, Session};
use tracing::{debug, info, warn};

use crate::counselor::Counselor;
use crate::error::{AgentError, SessionError};
use crate::events::{ChatEvent, EventSink};
use crate::prompts::{ERROR_MESSAGE, FAST_PATH_STEP};
use crate::router::FastPathRouter;
use crate::session::SessionStore;

/// Session ids the client made up before the server assigned one.
pub const TEMP_PREFIX: &str = "temp-";

const TITLE_CHARS: usize = 40;

pub fn is_temp_session(id: &str) -> bool {
    id.starts_with(TEMP_PREFIX)
}

/// Who is sending the message. Anonymous callers have no user id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub fast_path_chunk_size: usize,
    pub agent_chunk_size: usize,
    /// Error events carry the underlying error text.
    pub debug: bool,
}

impl TurnSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fast_path_chunk_size: config.chat.fast_path_chunk_size,
            agent_chunk_size: config.chat.agent_chunk_size,
            debug: config.debug,
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            fast_path_chunk_size: 100,
            agent_chunk_size: 50,
            debug: false,
        }
    }
}

/// A session as seen by one connection.
#[derive(Debug, Clone)]
pub struct OpenedSession {
    pub session: Session,
    /// False when the session was created by this call.
    pub existing: bool,
}

pub struct ChatService {
    router: FastPathRouter,
    counselor: Counselor,
    sessions: Arc<SessionStore>,
    settings: TurnSettings,
}

impl ChatService {
    pub fn new(
        router: FastPathRouter,
        counselor: Counselor,
        sessions: Arc<SessionStore>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            router,
            counselor,
            sessions,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Find or start the session a connection talks to.
    ///
    /// Temporary ids are never looked up; they get a local session that the
    /// first authenticated message replaces with a stored one.
    pub async fn open_session(&self, session_id: &str, caller: &Caller) -> Result<OpenedSession, AgentError> {
        let (mut session, existing) = if is_temp_session(session_id) {
            (Session::with_id(session_id, caller.user_id.clone()), false)
        } else if let Some(session) = self.sessions.get(session_id, caller.user_id()).await {
            (session, true)
        } else {
            (self.sessions.open(session_id, caller.user_id()).await?, false)
        };
        session.owner_email = caller.email.clone();
        Ok(OpenedSession { session, existing })
    }

    /// Run one turn for `message`, streaming events to `sink`.
    ///
    /// Unexpected failures end the turn with a single `error` event; `session`
    /// keeps whatever was appended before the failure.
    pub async fn run_turn(&self, session: &mut Session, caller: &Caller, message: &str, sink: &EventSink) {
        match self.turn(session, caller, message, sink).await {
            Ok(()) => {}
            Err(AgentError::Disconnected) => {
                debug!(session = %session.id, "client went away mid-turn");
            }
            Err(e) => {
                warn!(session = %session.id, error = %e, "chat turn failed");
                let event = ChatEvent::Error {
                    message: ERROR_MESSAGE.to_string(),
                    details: self.settings.debug.then(|| e.to_string()),
                };
                let _ = sink.emit(event).await;
            }
        }
    }

    async fn turn(
        &self,
        session: &mut Session,
        caller: &Caller,
        message: &str,
        sink: &EventSink,
    ) -> Result<(), AgentError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        if is_temp_session(&session.id) {
            if let Some(user_id) = caller.user_id() {
                let mut created = self
                    .sessions
                    .create(Some(user_id), Some(take_chars(message, TITLE_CHARS)))
                    .await;
                created.owner_email = caller.email.clone();
                info!(temp = %session.id, session = %created.id, "temporary session promoted");
                *session = created;
                sink.emit(ChatEvent::SessionCreated {
                    session_id: session.id.clone(),
                })
                .await?;
            }
        }

        self.append(session, Message::user(message), caller).await?;

        let routed = self.router.route(message, session).await;
        let (answer, chunk_size) = match routed.response {
            Some(response) if routed.handled => {
                sink.emit(ChatEvent::thinking(FAST_PATH_STEP)).await?;
                (response, self.settings.fast_path_chunk_size)
            }
            _ => {
                let reply = self.counselor.run(message, session, sink).await?;
                debug!(session = %session.id, outcome = ?reply.outcome, iterations = reply.iterations, "agent finished");
                (reply.text, self.settings.agent_chunk_size)
            }
        };

        for chunk in chunk_chars(&answer, chunk_size) {
            sink.emit(ChatEvent::chunk(chunk)).await?;
        }

        let reply = Message::assistant(answer.clone());
        let message_id = reply.id.clone();
        self.append(session, reply, caller).await?;

        sink.emit(ChatEvent::Complete {
            message_id,
            full_content: answer,
        })
        .await
    }

    /// Append to the local session, and to the store when the store tracks it.
    async fn append(&self, session: &mut Session, message: Message, caller: &Caller) -> Result<(), SessionError> {
        if is_temp_session(&session.id) {
            session.add_message(message);
            return Ok(());
        }
        let mut updated = self
            .sessions
            .append_message(&session.id, message, caller.user_id())
            .await?;
        updated.owner_email = session.owner_email.take();
        *session = updated;
        Ok(())
    }
}

//! The KCET counselor: intent extraction, the template fast path, the
//! tool-calling agent, session storage and per-turn event streaming.

pub mod counselor;
pub mod error;
pub mod events;
pub mod intent;
pub mod prompts;
pub mod resolve;
pub mod router;
pub mod session;
pub mod stream;
pub mod synthesis;
pub mod templates;
pub mod truncate;
pub mod turn;

pub use counselor::{AgentReply, Counselor, Outcome};
pub use error::{AgentError, SessionError};
pub use events::{sanitize_parameters, ChatEvent, EventSink, ToolCallStatus};
pub use intent::{Intent, IntentExtractor, IntentKind};
pub use router::{FastPathRouter, RouterResult};
pub use session::{NullBackend, SessionBackend, SessionStore};
pub use stream::TurnStream;
pub use turn::{is_temp_session, Caller, ChatService, OpenedSession, TurnSettings};

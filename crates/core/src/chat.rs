//! Conversation data model shared by the agent, the session store and the transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::text::take_chars;

/// Title given to sessions before the first user message arrives.
pub const DEFAULT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    /// Internal progress annotation, never replayed to the model.
    Thinking,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Thinking => "thinking",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            "thinking" => Ok(Self::Thinking),
            other => Err(format!("unknown message role: {}", other)),
        }
    }
}

/// A single immutable entry in a session's log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(rename = "message_id")]
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// An ordered, append-only conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "session_id")]
    pub id: String,
    /// Authenticated subject owning this session; `None` for anonymous chats.
    pub owner: Option<String>,
    /// Authenticated email of the current caller. Runtime only.
    #[serde(skip)]
    pub owner_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub title: String,
    pub preview: String,
}

impl Session {
    pub fn new(owner: Option<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), owner)
    }

    pub fn with_id(id: impl Into<String>, owner: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner,
            owner_email: None,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            title: DEFAULT_TITLE.to_string(),
            preview: String::new(),
        }
    }

    /// Append a message. The first user message seeds title and preview.
    pub fn add_message(&mut self, message: Message) {
        if message.role == MessageRole::User && self.preview.is_empty() {
            self.preview = take_chars(&message.content, 100).to_string();
            self.title = derive_title(&message.content);
        }
        self.messages.push(message);
        self.touch();
    }

    /// The last `min(limit, len)` messages, in original order.
    pub fn get_recent_messages(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    /// Bump `updated_at`, never moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Owned sessions are visible to their owner only; anonymous ones to whoever holds the id.
    pub fn visible_to(&self, caller: Option<&str>) -> bool {
        match self.owner.as_deref() {
            Some(owner) => caller == Some(owner),
            None => true,
        }
    }
}

/// Title derived from a first message: 40 characters, ellipsized when longer.
pub fn derive_title(content: &str) -> String {
    let head = take_chars(content, 40);
    if head.len() < content.len() {
        format!("{}...", head)
    } else {
        head.to_string()
    }
}

/// Lightweight listing row (no messages).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: String,
    pub preview: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            title: session.title.clone(),
            preview: session.preview.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            message_count: session.messages.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_order_and_content() {
        let mut session = Session::new(None);
        for i in 0..7 {
            session.add_message(Message::user(format!("message {}", i)));
        }
        let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[0], "message 0");
        assert_eq!(contents[6], "message 6");

        let recent = session.get_recent_messages(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "message 4");
        assert_eq!(recent[2].content, "message 6");

        assert_eq!(session.get_recent_messages(50).len(), 7);
        assert!(session.get_recent_messages(0).is_empty());
    }

    #[test]
    fn first_user_message_seeds_title_once() {
        let mut session = Session::new(Some("u1".into()));
        session.add_message(Message::assistant("Welcome!"));
        assert_eq!(session.title, DEFAULT_TITLE);

        let first = "Which colleges can I get with rank 12000 in computer science?";
        session.add_message(Message::user(first));
        assert_eq!(session.title, format!("{}...", &first[..40]));
        assert_eq!(session.preview, first);

        session.add_message(Message::user("second question"));
        assert_eq!(session.preview, first);
        assert!(session.updated_at >= session.created_at);
    }

    #[test]
    fn short_title_has_no_ellipsis() {
        assert_eq!(derive_title("hello"), "hello");
    }

    #[test]
    fn ownership_only_blocks_on_mismatch() {
        let owned = Session::new(Some("alice".into()));
        assert!(owned.visible_to(Some("alice")));
        assert!(!owned.visible_to(Some("bob")));
        assert!(!owned.visible_to(None));
        assert!(Session::new(None).visible_to(Some("bob")));
    }

    #[test]
    fn message_json_shape() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("message_id").is_some());
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }
}

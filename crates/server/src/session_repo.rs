//! PostgreSQL-backed chat history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pathfinder_agent::{SessionBackend, SessionError};
use pathfinder_core::{Message, MessageRole, Session, SessionSummary};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    title: String,
    preview: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    role: String,
    content: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    title: String,
    preview: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    message_count: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = SessionError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role: MessageRole = row.role.parse().map_err(SessionError::Backend)?;
        Ok(Message {
            id: row.id,
            role,
            content: row.content,
            timestamp: row.created_at,
            metadata: row.metadata,
        })
    }
}

impl SessionRow {
    fn into_session(self, messages: Vec<Message>) -> Session {
        Session {
            id: self.id,
            owner: Some(self.user_id),
            owner_email: None,
            created_at: self.created_at,
            updated_at: self.updated_at,
            messages,
            title: self.title,
            preview: self.preview,
        }
    }
}

impl From<SummaryRow> for SessionSummary {
    fn from(row: SummaryRow) -> Self {
        SessionSummary {
            session_id: row.id,
            title: row.title,
            preview: row.preview,
            created_at: row.created_at,
            updated_at: row.updated_at,
            message_count: usize::try_from(row.message_count).unwrap_or_default(),
        }
    }
}

fn backend(e: sqlx::Error) -> SessionError {
    SessionError::Backend(e.to_string())
}

pub struct PgSessionBackend {
    pool: PgPool,
}

impl PgSessionBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionBackend for PgSessionBackend {
    async fn insert_session(&self, session: &Session) -> Result<(), SessionError> {
        // Only owned sessions are stored; `user_id` is mandatory.
        let Some(owner) = session.owner.as_deref() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, title, preview, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&session.id)
        .bind(owner)
        .bind(&session.title)
        .bind(&session.preview)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn load_session(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, title, preview, created_at, updated_at \
             FROM chat_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let messages = sqlx::query_as::<_, MessageRow>(
            "SELECT id, role, content, metadata, created_at \
             FROM chat_messages WHERE session_id = $1 ORDER BY seq",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?
        .into_iter()
        .map(Message::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(row.into_session(messages)))
    }

    async fn insert_message(&self, session_id: &str, message: &Message) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO chat_messages (id, session_id, role, content, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&message.id)
        .bind(session_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.metadata)
        .bind(message.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        sqlx::query("UPDATE chat_sessions SET updated_at = $2 WHERE id = $1")
            .bind(session_id)
            .bind(message.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)
    }

    async fn update_session(&self, session: &Session) -> Result<(), SessionError> {
        sqlx::query(
            "UPDATE chat_sessions SET title = $2, preview = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(&session.id)
        .bind(&session.title)
        .bind(&session.preview)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn delete_session(&self, id: &str, owner: &str) -> Result<bool, SessionError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionSummary>, SessionError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT s.id, s.title, s.preview, s.created_at, s.updated_at, \
                    COUNT(m.id) AS message_count \
             FROM chat_sessions s \
             LEFT JOIN chat_messages m ON m.session_id = s.id \
             WHERE s.user_id = $1 \
             GROUP BY s.id \
             ORDER BY s.updated_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(SessionSummary::from).collect())
    }

    fn backend_name(&self) -> &str {
        "postgres"
    }
}

//! Session store: an in-memory cache in front of an optional durable backend.
//!
//! Reads hit the cache first. Writes update the cache and then the backend;
//! a failed backend write is logged and the live conversation carries on.
//! Only sessions with an owner are ever written to the backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pathfinder_core::{Message, Session, SessionSummary};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// Durable storage for sessions and their messages.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<(), SessionError>;

    /// A session with all of its messages, in order.
    async fn load_session(&self, id: &str) -> Result<Option<Session>, SessionError>;

    async fn insert_message(&self, session_id: &str, message: &Message) -> Result<(), SessionError>;

    /// Persist title, preview and `updated_at`.
    async fn update_session(&self, session: &Session) -> Result<(), SessionError>;

    /// Delete a session of `owner` and its messages.
    async fn delete_session(&self, id: &str, owner: &str) -> Result<bool, SessionError>;

    /// Sessions of `owner`, most recently updated first.
    async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionSummary>, SessionError>;

    fn backend_name(&self) -> &str;

    fn is_durable(&self) -> bool {
        true
    }
}

/// Backend for deployments without a database; the cache is the only store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

#[async_trait]
impl SessionBackend for NullBackend {
    async fn insert_session(&self, _session: &Session) -> Result<(), SessionError> {
        Ok(())
    }

    async fn load_session(&self, _id: &str) -> Result<Option<Session>, SessionError> {
        Ok(None)
    }

    async fn insert_message(&self, _session_id: &str, _message: &Message) -> Result<(), SessionError> {
        Ok(())
    }

    async fn update_session(&self, _session: &Session) -> Result<(), SessionError> {
        Ok(())
    }

    async fn delete_session(&self, _id: &str, _owner: &str) -> Result<bool, SessionError> {
        Ok(false)
    }

    async fn list_sessions(&self, _owner: &str) -> Result<Vec<SessionSummary>, SessionError> {
        Ok(Vec::new())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }

    fn is_durable(&self) -> bool {
        false
    }
}

pub struct SessionStore {
    cache: RwLock<HashMap<String, Session>>,
    backend: Arc<dyn SessionBackend>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        info!(backend = backend.backend_name(), "session store initialized");
        Self {
            cache: RwLock::new(HashMap::new()),
            backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(NullBackend))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    pub fn is_durable(&self) -> bool {
        self.backend.is_durable()
    }

    /// Create a session. A non-empty `title` replaces the default.
    pub async fn create(&self, owner: Option<&str>, title: Option<&str>) -> Session {
        let mut session = Session::new(owner.map(String::from));
        if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
            session.title = title.to_string();
        }
        self.cache
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        self.persist_new(&session).await;
        debug!(session = %session.id, "session created");
        session
    }

    /// The session with `id`, or `None` when it is unknown or owned by someone else.
    pub async fn get(&self, id: &str, owner: Option<&str>) -> Option<Session> {
        self.lookup(id).await.filter(|s| s.visible_to(owner))
    }

    /// The session with `id` whoever owns it, read through to the backend.
    async fn lookup(&self, id: &str) -> Option<Session> {
        if let Some(cached) = self.cache.read().await.get(id) {
            return Some(cached.clone());
        }

        let loaded = match self.backend.load_session(id).await {
            Ok(loaded) => loaded?,
            Err(e) => {
                warn!(session = %id, error = %e, "session load failed");
                return None;
            }
        };
        let cached = self
            .cache
            .write()
            .await
            .entry(id.to_string())
            .or_insert(loaded)
            .clone();
        Some(cached)
    }

    /// The session with `id`, created under that id when it does not exist yet.
    pub async fn open(&self, id: &str, owner: Option<&str>) -> Result<Session, SessionError> {
        if let Some(existing) = self.lookup(id).await {
            return if existing.visible_to(owner) {
                Ok(existing)
            } else {
                Err(SessionError::NotFound)
            };
        }
        let session = {
            let mut cache = self.cache.write().await;
            if let Some(existing) = cache.get(id) {
                // Someone else's session under the same id.
                if !existing.visible_to(owner) {
                    return Err(SessionError::NotFound);
                }
                return Ok(existing.clone());
            }
            let session = Session::with_id(id, owner.map(String::from));
            cache.insert(id.to_string(), session.clone());
            session
        };
        self.persist_new(&session).await;
        Ok(session)
    }

    /// Append `message` to session `id` and return the updated session.
    pub async fn append_message(
        &self,
        id: &str,
        message: Message,
        owner: Option<&str>,
    ) -> Result<Session, SessionError> {
        // Make sure the session is cached before mutating it.
        if self.get(id, owner).await.is_none() {
            return Err(SessionError::NotFound);
        }

        let session = {
            let mut cache = self.cache.write().await;
            let session = cache.get_mut(id).ok_or(SessionError::NotFound)?;
            session.add_message(message.clone());
            session.clone()
        };

        if session.owner.is_some() {
            if let Err(e) = self.backend.insert_message(id, &message).await {
                warn!(session = %id, error = %e, "message not persisted");
            } else if let Err(e) = self.backend.update_session(&session).await {
                warn!(session = %id, error = %e, "session metadata not persisted");
            }
        }
        Ok(session)
    }

    /// Messages of a session, optionally only the last `limit`. Unknown sessions yield none.
    pub async fn get_messages(&self, id: &str, limit: Option<usize>, owner: Option<&str>) -> Vec<Message> {
        let Some(session) = self.get(id, owner).await else {
            return Vec::new();
        };
        match limit {
            Some(limit) => session.get_recent_messages(limit).to_vec(),
            None => session.messages,
        }
    }

    pub async fn rename(&self, id: &str, title: &str, owner: Option<&str>) -> Option<Session> {
        self.get(id, owner).await?;
        let session = {
            let mut cache = self.cache.write().await;
            let session = cache.get_mut(id)?;
            if !title.trim().is_empty() {
                session.title = title.trim().to_string();
                session.touch();
            }
            session.clone()
        };
        if session.owner.is_some() {
            if let Err(e) = self.backend.update_session(&session).await {
                warn!(session = %id, error = %e, "rename not persisted");
            }
        }
        Some(session)
    }

    /// Remove a session from the cache and, for its owner, from the backend.
    pub async fn delete(&self, id: &str, owner: Option<&str>) -> bool {
        let removed = {
            let mut cache = self.cache.write().await;
            match cache.get(id) {
                Some(session) if !session.visible_to(owner) => return false,
                Some(_) => cache.remove(id).is_some(),
                None => false,
            }
        };
        let Some(owner) = owner else {
            return removed;
        };
        let deleted = match self.backend.delete_session(id, owner).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(session = %id, error = %e, "session delete failed");
                false
            }
        };
        removed || deleted
    }

    /// Sessions of `owner`, most recently updated first. Anonymous callers get none.
    ///
    /// Listed from the backend when there is one, otherwise from the cache.
    pub async fn list(&self, owner: Option<&str>) -> Vec<SessionSummary> {
        let Some(owner) = owner else {
            return Vec::new();
        };
        if self.is_durable() {
            match self.backend.list_sessions(owner).await {
                Ok(sessions) => return sessions,
                Err(e) => warn!(owner = %owner, error = %e, "session listing failed, using cache"),
            }
        }

        let mut sessions: Vec<SessionSummary> = self
            .cache
            .read()
            .await
            .values()
            .filter(|s| s.owner.as_deref() == Some(owner))
            .map(SessionSummary::from)
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    async fn persist_new(&self, session: &Session) {
        if session.owner.is_none() {
            return;
        }
        if let Err(e) = self.backend.insert_session(session).await {
            warn!(session = %session.id, error = %e, "session not persisted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Backend keeping everything in a map, with a switch to fail every call.
    #[derive(Default)]
    struct MapBackend {
        sessions: Mutex<HashMap<String, Session>>,
        failing: bool,
    }

    impl MapBackend {
        fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        fn check(&self) -> Result<(), SessionError> {
            if self.failing {
                Err(SessionError::Backend("database unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SessionBackend for MapBackend {
        async fn insert_session(&self, session: &Session) -> Result<(), SessionError> {
            self.check()?;
            self.sessions
                .lock()
                .unwrap()
                .insert(session.id.clone(), session.clone());
            Ok(())
        }

        async fn load_session(&self, id: &str) -> Result<Option<Session>, SessionError> {
            self.check()?;
            Ok(self.sessions.lock().unwrap().get(id).cloned())
        }

        async fn insert_message(&self, session_id: &str, message: &Message) -> Result<(), SessionError> {
            self.check()?;
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions.get_mut(session_id).ok_or(SessionError::NotFound)?;
            session.messages.push(message.clone());
            Ok(())
        }

        async fn update_session(&self, session: &Session) -> Result<(), SessionError> {
            self.check()?;
            if let Some(stored) = self.sessions.lock().unwrap().get_mut(&session.id) {
                stored.title = session.title.clone();
                stored.preview = session.preview.clone();
                stored.updated_at = session.updated_at;
            }
            Ok(())
        }

        async fn delete_session(&self, id: &str, owner: &str) -> Result<bool, SessionError> {
            self.check()?;
            let mut sessions = self.sessions.lock().unwrap();
            if sessions.get(id).and_then(|s| s.owner.as_deref()) != Some(owner) {
                return Ok(false);
            }
            Ok(sessions.remove(id).is_some())
        }

        async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionSummary>, SessionError> {
            self.check()?;
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.owner.as_deref() == Some(owner))
                .map(SessionSummary::from)
                .collect())
        }

        fn backend_name(&self) -> &str {
            "map"
        }
    }

    #[tokio::test]
    async fn appended_messages_keep_order() {
        let store = SessionStore::in_memory();
        let session = store.create(None, None).await;
        for i in 0..6 {
            store
                .append_message(&session.id, Message::user(format!("m{}", i)), None)
                .await
                .unwrap();
        }

        let all = store.get_messages(&session.id, None, None).await;
        let contents: Vec<_> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4", "m5"]);

        let recent = store.get_messages(&session.id, Some(2), None).await;
        assert_eq!(recent[0].content, "m4");
        assert_eq!(recent[1].content, "m5");

        let stored = store.get(&session.id, None).await.unwrap();
        assert_eq!(stored.title, "m0");
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn other_owners_cannot_see_a_session() {
        let store = SessionStore::in_memory();
        let session = store.create(Some("user-b"), None).await;

        assert!(store.get(&session.id, Some("user-a")).await.is_none());
        assert!(store.get(&session.id, Some("user-b")).await.is_some());
        assert!(matches!(
            store
                .append_message(&session.id, Message::user("hi"), Some("user-a"))
                .await,
            Err(SessionError::NotFound)
        ));
        assert!(!store.delete(&session.id, Some("user-a")).await);
        assert!(store.delete(&session.id, Some("user-b")).await);
        assert!(store.get(&session.id, Some("user-b")).await.is_none());
    }

    #[tokio::test]
    async fn owned_sessions_reach_the_backend() {
        let backend = Arc::new(MapBackend::default());
        let store = SessionStore::new(backend.clone());

        let owned = store.create(Some("user-a"), Some("Planning")).await;
        store
            .append_message(&owned.id, Message::user("my rank is 5000"), Some("user-a"))
            .await
            .unwrap();
        let anonymous = store.create(None, None).await;

        {
            let stored = backend.sessions.lock().unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[&owned.id].messages.len(), 1);
            assert!(!stored.contains_key(&anonymous.id));
        }

        // A fresh store reads through to the backend.
        let reopened = SessionStore::new(backend.clone());
        let loaded = reopened.get(&owned.id, Some("user-a")).await.unwrap();
        assert_eq!(loaded.messages[0].content, "my rank is 5000");

        let listed = reopened.list(Some("user-a")).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, owned.id);
    }

    #[tokio::test]
    async fn backend_failures_do_not_fail_the_conversation() {
        let store = SessionStore::new(Arc::new(MapBackend::failing()));
        let session = store.create(Some("user-a"), None).await;

        let updated = store
            .append_message(&session.id, Message::user("still works"), Some("user-a"))
            .await
            .unwrap();
        assert_eq!(updated.messages.len(), 1);

        // Listing falls back to the cache.
        assert_eq!(store.list(Some("user-a")).await.len(), 1);
    }

    #[tokio::test]
    async fn open_creates_under_the_requested_id() {
        let store = SessionStore::in_memory();
        let session = store.open("abc-123", None).await.unwrap();
        assert_eq!(session.id, "abc-123");

        let owned = store.open("owned-1", Some("user-a")).await.unwrap();
        assert_eq!(owned.owner.as_deref(), Some("user-a"));
        assert!(matches!(
            store.open("owned-1", Some("user-b")).await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn rename_and_listing() {
        let store = SessionStore::in_memory();
        let first = store.create(Some("user-a"), None).await;
        let second = store.create(Some("user-a"), None).await;
        store.create(Some("user-b"), None).await;
        store.create(None, None).await;

        let renamed = store
            .rename(&first.id, "Cutoff research", Some("user-a"))
            .await
            .unwrap();
        assert_eq!(renamed.title, "Cutoff research");
        assert!(store.rename("missing", "x", Some("user-a")).await.is_none());

        let listed = store.list(Some("user-a")).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, first.id);
        assert_eq!(listed[1].session_id, second.id);
    }

    #[tokio::test]
    async fn anonymous_callers_cannot_reach_owned_sessions() {
        let backend = Arc::new(MapBackend::default());
        let store = SessionStore::new(backend.clone());
        let owned = store.create(Some("user-a"), None).await;
        store
            .append_message(&owned.id, Message::user("my rank is 5000"), Some("user-a"))
            .await
            .unwrap();

        assert!(store.get(&owned.id, None).await.is_none());
        assert!(store.get_messages(&owned.id, None, None).await.is_empty());
        assert!(store.rename(&owned.id, "mine now", None).await.is_none());
        assert!(matches!(
            store.append_message(&owned.id, Message::user("hi"), None).await,
            Err(SessionError::NotFound)
        ));
        assert!(matches!(store.open(&owned.id, None).await, Err(SessionError::NotFound)));
        assert!(!store.delete(&owned.id, None).await);

        // Not cached in this store, so only the backend knows the owner.
        let fresh = SessionStore::new(backend.clone());
        assert!(matches!(fresh.open(&owned.id, None).await, Err(SessionError::NotFound)));
        assert!(!fresh.delete(&owned.id, None).await);
        assert!(backend.sessions.lock().unwrap().contains_key(&owned.id));
        assert_eq!(
            fresh.get(&owned.id, Some("user-a")).await.unwrap().messages.len(),
            1
        );
    }

    #[tokio::test]
    async fn anonymous_sessions_are_never_listed() {
        let store = SessionStore::in_memory();
        let anonymous = store.create(None, None).await;
        store
            .append_message(&anonymous.id, Message::user("my rank is 9000"), None)
            .await
            .unwrap();
        store.create(Some("user-a"), None).await;

        assert!(store.list(None).await.is_empty());
        assert!(store.list(Some("user-a")).await.iter().all(|s| s.session_id != anonymous.id));

        // The holder of the id can still use and delete it.
        assert_eq!(store.get_messages(&anonymous.id, None, None).await.len(), 1);
        assert!(store.delete(&anonymous.id, None).await);
        assert!(store.get(&anonymous.id, None).await.is_none());
    }
}

//! In-memory session store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SessionState;
use crate::types::message::{Author, Turn};
use crate::{Error, ErrorContext, Result};

fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn poisoned(what: &str) -> Error {
    Error::session_with_context(
        format!("{} lock poisoned", what),
        ErrorContext::new().with_source("in_memory_session"),
    )
}

/// One recorded event of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub author: Author,
    pub invocation_id: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Turn>,
    /// State changes applied to the session when the event is appended.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub state_delta: serde_json::Map<String, serde_json::Value>,
}

impl SessionEvent {
    pub fn new(author: Author, invocation_id: impl Into<String>) -> Self {
        Self {
            author,
            invocation_id: invocation_id.into(),
            timestamp: timestamp(),
            content: None,
            state_delta: serde_json::Map::new(),
        }
    }

    pub fn with_content(mut self, content: Turn) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_timestamp(mut self, ts: f64) -> Self {
        self.timestamp = ts;
        self
    }

    pub fn with_state_delta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.state_delta.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Default)]
struct SessionData {
    state: HashMap<String, serde_json::Value>,
    events: Vec<SessionEvent>,
    last_update_time: f64,
}

/// A session held entirely in process memory.
#[derive(Debug)]
pub struct InMemorySession {
    id: String,
    app_name: String,
    user_id: String,
    data: RwLock<SessionData>,
}

impl InMemorySession {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            app_name: app_name.into(),
            user_id: user_id.into(),
            data: RwLock::new(SessionData {
                last_update_time: timestamp(),
                ..SessionData::default()
            }),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SessionData>> {
        self.data.read().map_err(|_| poisoned("session"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SessionData>> {
        self.data.write().map_err(|_| poisoned("session"))
    }

    /// Record an event and apply its state delta.
    pub fn append_event(&self, event: SessionEvent) -> Result<()> {
        let mut data = self.write()?;
        for (k, v) in &event.state_delta {
            data.state.insert(k.clone(), v.clone());
        }
        data.last_update_time = data.last_update_time.max(event.timestamp);
        data.events.push(event);
        Ok(())
    }

    pub fn events(&self) -> Result<Vec<SessionEvent>> {
        Ok(self.read()?.events.clone())
    }

    pub fn last_update_time(&self) -> Result<f64> {
        Ok(self.read()?.last_update_time)
    }
}

#[async_trait]
impl SessionState for InMemorySession {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.read()?.state.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut data = self.write()?;
        data.state.insert(key.to_string(), value);
        data.last_update_time = timestamp();
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.write()?.state.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.read()?.state.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

type SessionIndex = (String, String, String);

/// Creates and indexes [`InMemorySession`]s by app, user and session id.
#[derive(Debug, Default)]
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<SessionIndex, Arc<InMemorySession>>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session; a missing id gets a fresh UUID.
    pub fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Arc<InMemorySession>> {
        let id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let index = (app_name.to_string(), user_id.to_string(), id.clone());
        let mut sessions = self.sessions.write().map_err(|_| poisoned("session index"))?;
        if sessions.contains_key(&index) {
            return Err(Error::session_with_context(
                format!("session '{}' already exists", id),
                ErrorContext::new()
                    .with_source("in_memory_session_service")
                    .with_details(format!("app: {}, user: {}", app_name, user_id)),
            ));
        }
        let session = Arc::new(InMemorySession::new(app_name, user_id, id));
        sessions.insert(index, session.clone());
        Ok(session)
    }

    pub fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Arc<InMemorySession>>> {
        let sessions = self.sessions.read().map_err(|_| poisoned("session index"))?;
        Ok(sessions
            .get(&(app_name.to_string(), user_id.to_string(), session_id.to_string()))
            .cloned())
    }

    /// Sessions of one user, ordered by session id.
    pub fn list_sessions(&self, app_name: &str, user_id: &str) -> Result<Vec<Arc<InMemorySession>>> {
        let sessions = self.sessions.read().map_err(|_| poisoned("session index"))?;
        let mut found: Vec<Arc<InMemorySession>> = sessions
            .iter()
            .filter(|((app, user, _), _)| app == app_name && user == user_id)
            .map(|(_, s)| s.clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_state_round_trip() {
        let session = InMemorySession::new("app", "u1", "s1");
        assert_eq!(session.get("k").await.unwrap(), None);
        session.set("k", json!({"v": 1})).await.unwrap();
        assert!(session.contains("k").await.unwrap());
        assert_eq!(session.keys().await.unwrap(), vec!["k".to_string()]);
        assert!(session.remove("k").await.unwrap());
        assert!(!session.remove("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_append_event_applies_state_delta() {
        let session = InMemorySession::new("app", "u1", "s1");
        let event = SessionEvent::new(Author::Agent("analysis_bot".into()), "inv-1")
            .with_state_delta("post_analysis_v1", json!({"turn_count": 2}));
        session.append_event(event).unwrap();
        assert_eq!(
            session.get("post_analysis_v1").await.unwrap(),
            Some(json!({"turn_count": 2}))
        );
        assert_eq!(session.events().unwrap().len(), 1);
    }

    #[test]
    fn test_service_rejects_duplicate_ids() {
        let service = InMemorySessionService::new();
        service.create_session("app", "u1", Some("s1")).unwrap();
        assert!(service.create_session("app", "u1", Some("s1")).is_err());
        assert!(service.create_session("app", "u2", Some("s1")).is_ok());
        assert_eq!(service.list_sessions("app", "u1").unwrap().len(), 1);
        assert!(service.get_session("app", "u1", "s1").unwrap().is_some());
        assert!(service.get_session("app", "u1", "nope").unwrap().is_none());
    }
}

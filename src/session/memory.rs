//! In-memory session store.

use super::{new_session_id, render_history, Exchange, SessionStore};
use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Sessions held in process memory; lost on restart.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<Exchange>>>,
    max_history: usize,
}

impl MemorySessionStore {
    /// Keep at most `max_history` exchanges per session.
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<Exchange>>>> {
        self.sessions
            .read()
            .map_err(|e| SyllabusError::Session(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<Exchange>>>> {
        self.sessions
            .write()
            .map_err(|e| SyllabusError::Session(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self) -> Result<String> {
        let id = new_session_id();
        self.write()?.insert(id.clone(), Vec::new());
        debug!("Created session {}", id);
        Ok(id)
    }

    async fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) -> Result<()> {
        let mut sessions = self.write()?;
        let exchanges = sessions.entry(session_id.to_string()).or_default();
        exchanges.push(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });
        if exchanges.len() > self.max_history {
            let excess = exchanges.len() - self.max_history;
            exchanges.drain(..excess);
        }
        Ok(())
    }

    async fn get_conversation_history(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self
            .read()?
            .get(session_id)
            .and_then(|exchanges| render_history(exchanges)))
    }

    async fn clear_session(&self, session_id: &str) -> Result<()> {
        if let Some(exchanges) = self.write()?.get_mut(session_id) {
            exchanges.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_session_has_no_history() {
        let store = MemorySessionStore::new(2);
        let id = store.create_session().await.unwrap();
        assert_eq!(store.get_conversation_history(&id).await.unwrap(), None);
        assert_eq!(store.get_conversation_history("unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_history_keeps_most_recent_exchanges() {
        let store = MemorySessionStore::new(2);
        let id = store.create_session().await.unwrap();
        store.add_exchange(&id, "q1", "a1").await.unwrap();
        store.add_exchange(&id, "q2", "a2").await.unwrap();
        store.add_exchange(&id, "q3", "a3").await.unwrap();

        assert_eq!(
            store.get_conversation_history(&id).await.unwrap().as_deref(),
            Some("User: q2\nAssistant: a2\nUser: q3\nAssistant: a3")
        );
    }

    #[tokio::test]
    async fn test_add_exchange_to_unknown_session_creates_it() {
        let store = MemorySessionStore::new(2);
        store.add_exchange("external", "hi", "hello").await.unwrap();
        assert!(store.get_conversation_history("external").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_session() {
        let store = MemorySessionStore::new(2);
        let id = store.create_session().await.unwrap();
        store.add_exchange(&id, "q", "a").await.unwrap();
        store.clear_session(&id).await.unwrap();
        assert_eq!(store.get_conversation_history(&id).await.unwrap(), None);

        store.clear_session("never-existed").await.unwrap();
    }
}

//! SQLite-backed session store. History survives restarts.

use super::{new_session_id, render_history, Exchange, SessionStore};
use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS exchanges (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        user_text TEXT NOT NULL,
        assistant_text TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_exchanges_session ON exchanges(session_id, id);
"#;

pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    max_history: usize,
}

impl SqliteSessionStore {
    /// Open (or create) a session database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, max_history: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite session store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            max_history,
        })
    }

    pub fn in_memory(max_history: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            max_history,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SyllabusError::Session(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self) -> Result<String> {
        let id = new_session_id();
        self.lock()?.execute(
            "INSERT INTO sessions (id, created_at) VALUES (?1, ?2)",
            params![id, Utc::now().to_rfc3339()],
        )?;
        debug!("Created session {}", id);
        Ok(id)
    }

    async fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT OR IGNORE INTO sessions (id, created_at) VALUES (?1, ?2)",
            params![session_id, now],
        )?;
        conn.execute(
            "INSERT INTO exchanges (session_id, user_text, assistant_text, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, user, assistant, now],
        )?;
        Ok(())
    }

    async fn get_conversation_history(&self, session_id: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_text, assistant_text FROM exchanges
             WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;

        let mut exchanges = stmt
            .query_map(params![session_id, self.max_history as i64], |row| {
                Ok(Exchange {
                    user: row.get(0)?,
                    assistant: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        exchanges.reverse();

        Ok(render_history(&exchanges))
    }

    async fn clear_session(&self, session_id: &str) -> Result<()> {
        let removed = self.lock()?.execute(
            "DELETE FROM exchanges WHERE session_id = ?1",
            params![session_id],
        )?;
        debug!("Cleared {} exchanges from session {}", removed, session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_history_window() {
        let store = SqliteSessionStore::in_memory(2).unwrap();
        let id = store.create_session().await.unwrap();
        assert_eq!(store.get_conversation_history(&id).await.unwrap(), None);

        for i in 1..=3 {
            store
                .add_exchange(&id, &format!("q{}", i), &format!("a{}", i))
                .await
                .unwrap();
        }

        assert_eq!(
            store.get_conversation_history(&id).await.unwrap().as_deref(),
            Some("User: q2\nAssistant: a2\nUser: q3\nAssistant: a3")
        );
    }

    #[tokio::test]
    async fn test_clear_session_keeps_other_sessions() {
        let store = SqliteSessionStore::in_memory(2).unwrap();
        let a = store.create_session().await.unwrap();
        let b = store.create_session().await.unwrap();
        store.add_exchange(&a, "qa", "aa").await.unwrap();
        store.add_exchange(&b, "qb", "ab").await.unwrap();

        store.clear_session(&a).await.unwrap();
        assert_eq!(store.get_conversation_history(&a).await.unwrap(), None);
        assert!(store.get_conversation_history(&b).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_history_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.db");

        let id = {
            let store = SqliteSessionStore::new(&path, 2).unwrap();
            let id = store.create_session().await.unwrap();
            store.add_exchange(&id, "hello", "hi there").await.unwrap();
            id
        };

        let reopened = SqliteSessionStore::new(&path, 2).unwrap();
        assert_eq!(
            reopened.get_conversation_history(&id).await.unwrap().as_deref(),
            Some("User: hello\nAssistant: hi there")
        );
    }
}

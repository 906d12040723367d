//! Per-conversation exchange logs.
//!
//! A session is an ordered list of (user, assistant) exchanges keyed by an
//! opaque id. The orchestrator reads a rendered history before a query and
//! appends one exchange after it completes.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::config::{Settings, StoreProvider};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Storage for conversation history.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a new, empty session and return its id.
    async fn create_session(&self) -> Result<String>;

    /// Append an exchange. Unknown ids start a new session under that id.
    async fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) -> Result<()>;

    /// Rendered recent history, or `None` for unknown or empty sessions.
    async fn get_conversation_history(&self, session_id: &str) -> Result<Option<String>>;

    /// Drop every exchange in the session.
    async fn clear_session(&self, session_id: &str) -> Result<()>;
}

/// Generate a fresh session id.
pub(crate) fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Render exchanges as alternating `User:` / `Assistant:` lines.
pub fn render_history(exchanges: &[Exchange]) -> Option<String> {
    if exchanges.is_empty() {
        return None;
    }
    let lines: Vec<String> = exchanges
        .iter()
        .map(|e| format!("User: {}\nAssistant: {}", e.user, e.assistant))
        .collect();
    Some(lines.join("\n"))
}

/// Build the session store selected in settings.
pub fn create_session_store(settings: &Settings) -> Result<Arc<dyn SessionStore>> {
    let max_history = settings.session.max_history;
    debug!("Opening {} session store", settings.session.provider);
    let store: Arc<dyn SessionStore> = match settings.session.provider {
        StoreProvider::Memory => Arc::new(MemorySessionStore::new(max_history)),
        StoreProvider::Sqlite => Arc::new(SqliteSessionStore::new(
            &settings.session_store_path(),
            max_history,
        )?),
    };
    Ok(store)
}

//! Session persistence interface.
//!
//! The orchestrator loads a session, runs the turn, and writes the session
//! back under a per-session lock, so stores only need whole-session get/put.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::errors::AgentError;
use super::types::Session;

/// Keyed session storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Result<Option<Session>, AgentError>;

    /// Insert or replace the session stored under `session.id`.
    fn put(&self, session: &Session) -> Result<(), AgentError>;

    /// Sorted ids of every stored session.
    fn list_ids(&self) -> Result<Vec<String>, AgentError>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, AgentError> {
        self.sessions.lock().map_err(|e| AgentError::SessionStore {
            reason: format!("session map lock poisoned: {e}"),
        })
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str) -> Result<Option<Session>, AgentError> {
        Ok(self.lock()?.get(session_id).cloned())
    }

    fn put(&self, session: &Session) -> Result<(), AgentError> {
        self.lock()?.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>, AgentError> {
        let mut ids: Vec<String> = self.lock()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

//! SQLite-backed session store.
//!
//! Uses `rusqlite` in synchronous mode behind a mutex; the orchestrator
//! already serializes turns per session. History and the context log are
//! append-only, so `put` only inserts rows past what is already stored.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::errors::AgentError;
use super::session_store::SessionStore;
use super::types::{Session, Turn, TurnRole};

// ─── Database ───────────────────────────────────────────────────────────────

/// Durable session store.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (or create) the session database at the given path.
    pub fn open(path: &Path) -> Result<Self, AgentError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| AgentError::SessionStore {
                    reason: format!("failed to create {}: {e}", parent.display()),
                })?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory database (tests, ephemeral runs).
    pub fn open_in_memory() -> Result<Self, AgentError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AgentError> {
        // WAL for concurrent readers; ignored for in-memory databases
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AgentError> {
        self.conn.lock().map_err(|e| AgentError::SessionStore {
            reason: format!("connection lock poisoned: {e}"),
        })
    }
}

/// Create all required tables if they don't exist.
fn create_tables(conn: &Connection) -> Result<(), AgentError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS turns (
            session_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            PRIMARY KEY (session_id, position),
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );

        CREATE TABLE IF NOT EXISTS context_log (
            session_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            context TEXT NOT NULL,
            PRIMARY KEY (session_id, position),
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );
        ",
    )?;
    Ok(())
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, session_id: &str) -> Result<Option<Session>, AgentError> {
        let conn = self.lock()?;

        let header: Option<(String, String)> = conn
            .query_row(
                "SELECT created_at, updated_at FROM sessions WHERE id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((created_at, updated_at)) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT role, content FROM turns WHERE session_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut history = Vec::new();
        for row in rows {
            let (role, content) = row?;
            let role = TurnRole::parse(&role).ok_or_else(|| AgentError::SessionStore {
                reason: format!("unknown turn role '{role}' in session '{session_id}'"),
            })?;
            history.push(Turn { role, content });
        }

        let mut stmt = conn.prepare(
            "SELECT context FROM context_log WHERE session_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
        let mut context_log = Vec::new();
        for row in rows {
            context_log.push(row?);
        }

        Ok(Some(Session {
            id: session_id.to_string(),
            history,
            context_log,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }

    fn put(&self, session: &Session) -> Result<(), AgentError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO sessions (id, created_at, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
            params![
                session.id,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339()
            ],
        )?;

        let stored_turns = count_rows(&tx, "turns", &session.id)?;
        if stored_turns > session.history.len() {
            return Err(AgentError::SessionStore {
                reason: format!(
                    "session '{}' history would shrink from {stored_turns} to {} turns",
                    session.id,
                    session.history.len()
                ),
            });
        }
        for (position, turn) in session.history.iter().enumerate().skip(stored_turns) {
            tx.execute(
                "INSERT INTO turns (session_id, position, role, content) VALUES (?1, ?2, ?3, ?4)",
                params![session.id, position as i64, turn.role.as_str(), turn.content],
            )?;
        }

        let stored_contexts = count_rows(&tx, "context_log", &session.id)?;
        for (position, context) in session.context_log.iter().enumerate().skip(stored_contexts) {
            tx.execute(
                "INSERT INTO context_log (session_id, position, context) VALUES (?1, ?2, ?3)",
                params![session.id, position as i64, context],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>, AgentError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM sessions ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Rows stored for a session in one of the append-only tables.
fn count_rows(conn: &Connection, table: &str, session_id: &str) -> Result<usize, AgentError> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE session_id = ?1"),
        params![session_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, AgentError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AgentError::SessionStore {
            reason: format!("invalid timestamp '{s}': {e}"),
        })
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> SqliteSessionStore {
        SqliteSessionStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_session_not_found() {
        let db = test_db();
        assert!(db.get("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_put_and_get_roundtrip() {
        let db = test_db();
        let mut session = Session::new("s1");
        session.record_turn("What is Ana's profile?", "Ana Müller, TechCorp Berlin.", "External service data");
        db.put(&session).unwrap();

        let loaded = db.get("s1").unwrap().unwrap();
        assert_eq!(loaded.history, session.history);
        assert_eq!(loaded.context_log, session.context_log);
        assert_eq!(loaded.created_at.timestamp_micros(), session.created_at.timestamp_micros());
    }

    #[test]
    fn test_put_appends_only_new_turns() {
        let db = test_db();
        let mut session = Session::new("s1");
        session.record_turn("q1", "a1", "c1");
        db.put(&session).unwrap();
        session.record_turn("q2", "a2", "c2");
        db.put(&session).unwrap();
        db.put(&session).unwrap();

        let loaded = db.get("s1").unwrap().unwrap();
        assert_eq!(loaded.history.len(), 4);
        assert_eq!(loaded.history[2], Turn::user("q2"));
        assert_eq!(loaded.context_log, vec!["c1", "c2"]);
        assert!(loaded.updated_at >= loaded.created_at);
    }

    #[test]
    fn test_shrinking_history_rejected() {
        let db = test_db();
        let mut session = Session::new("s1");
        session.record_turn("q1", "a1", "c1");
        db.put(&session).unwrap();

        let fresh = Session::new("s1");
        let err = db.put(&fresh).unwrap_err();
        assert!(matches!(err, AgentError::SessionStore { .. }));
        assert_eq!(db.get("s1").unwrap().unwrap().history.len(), 2);
    }

    #[test]
    fn test_list_ids() {
        let db = test_db();
        db.put(&Session::new("beta")).unwrap();
        db.put(&Session::new("alpha")).unwrap();
        assert_eq!(db.list_ids().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");

        {
            let db = SqliteSessionStore::open(&path).unwrap();
            let mut session = Session::new("persistent");
            session.record_turn("q", "a", "ctx");
            db.put(&session).unwrap();
        }

        let db = SqliteSessionStore::open(&path).unwrap();
        let loaded = db.get("persistent").unwrap().unwrap();
        assert_eq!(loaded.history.len(), 2);
        assert_eq!(loaded.context_log, vec!["ctx"]);
    }
}

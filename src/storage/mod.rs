use crate::error::{Result, SqlChatError};
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub mod types;
pub use types::{Role, StoredMessage, StoredSession};

/// Maps any displayable failure into a storage error with a short context.
fn storage_err<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> SqlChatError {
    move |e| SqlChatError::Storage(format!("{}: {}", context, e))
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Storage backend for chat sessions and their messages
///
/// Each operation opens its own connection. Writes are serialized through
/// `write_lock` so in-process insertion order matches display order.
pub struct SqliteStorage {
    db_path: PathBuf,
    write_lock: Mutex<()>,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory, unless
    /// `SQLCHAT_SESSIONS_DB` points somewhere else.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("SQLCHAT_SESSIONS_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "sqlchat", "sqlchat")
            .ok_or_else(|| SqlChatError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("sessions.db"))
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use sqlchat::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("sessions.db")).unwrap();
    /// assert!(storage.list_sessions().unwrap().is_empty());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(storage_err("Failed to create parent directory for database"))?;
            }
        }

        let storage = Self {
            db_path,
            write_lock: Mutex::new(()),
        };
        storage.init()?;
        tracing::debug!(path = %storage.db_path.display(), "Session store ready");
        Ok(storage)
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path).map_err(storage_err("Failed to open database"))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(storage_err("Failed to set busy timeout"))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(storage_err("Failed to enable foreign keys"))?;
        Ok(conn)
    }

    fn lock_writes(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| SqlChatError::Storage("write lock poisoned".into()).into())
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                session_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_activity TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL
                    REFERENCES sessions (session_id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session
                ON messages (session_id, id);",
        )
        .map_err(storage_err("Failed to create tables"))?;

        Ok(())
    }

    /// Insert a session or update its name, refreshing `last_activity`
    ///
    /// `created_at` is preserved for existing rows.
    pub fn create_or_update_session(&self, session_id: &str, session_name: &str) -> Result<()> {
        let _guard = self.lock_writes()?;
        let conn = self.connect()?;
        let now = now_rfc3339();

        conn.execute(
            "INSERT INTO sessions (session_id, session_name, created_at, last_activity)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(session_id) DO UPDATE SET
                session_name = excluded.session_name,
                last_activity = excluded.last_activity",
            params![session_id, session_name, now],
        )
        .map_err(storage_err("Failed to save session"))?;

        Ok(())
    }

    /// Append a message and touch the parent session's `last_activity`
    ///
    /// # Errors
    ///
    /// Returns `SqlChatError::Storage` if the database is unreachable, the
    /// write fails, or `session_id` does not reference a stored session.
    pub fn append_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        timestamp: &str,
    ) -> Result<StoredMessage> {
        let _guard = self.lock_writes()?;
        let mut conn = self.connect()?;
        let now = now_rfc3339();

        let tx = conn
            .transaction()
            .map_err(storage_err("Failed to start transaction"))?;

        tx.execute(
            "INSERT INTO messages (session_id, role, content, timestamp, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![session_id, role.as_str(), content, timestamp, now],
        )
        .map_err(storage_err("Failed to insert message"))?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE sessions SET last_activity = ? WHERE session_id = ?",
            params![now, session_id],
        )
        .map_err(storage_err("Failed to touch session"))?;

        tx.commit()
            .map_err(storage_err("Failed to commit transaction"))?;

        Ok(StoredMessage {
            id,
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            timestamp: timestamp.to_string(),
            created_at: parse_timestamp(&now),
        })
    }

    /// List a session's messages in insertion order
    pub fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let conn = self.connect()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, role, content, timestamp, created_at
                 FROM messages
                 WHERE session_id = ?
                 ORDER BY id ASC",
            )
            .map_err(storage_err("Failed to prepare statement"))?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                let role: String = row.get(2)?;
                let created_at: String = row.get(5)?;
                Ok(StoredMessage {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    role: Role::parse_str(&role).unwrap_or(Role::Assistant),
                    content: row.get(3)?,
                    timestamp: row.get(4)?,
                    created_at: parse_timestamp(&created_at),
                })
            })
            .map_err(storage_err("Failed to query messages"))?;

        let messages = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_err("Failed to read message row"))?;
        Ok(messages)
    }

    /// List sessions, most recently active first
    pub fn list_sessions(&self) -> Result<Vec<StoredSession>> {
        let conn = self.connect()?;

        let mut stmt = conn
            .prepare(
                "SELECT s.session_id, s.session_name, s.created_at, s.last_activity,
                        (SELECT COUNT(*) FROM messages m WHERE m.session_id = s.session_id)
                 FROM sessions s
                 ORDER BY s.last_activity DESC, s.created_at DESC",
            )
            .map_err(storage_err("Failed to prepare statement"))?;

        let rows = stmt
            .query_map([], session_from_row)
            .map_err(storage_err("Failed to query sessions"))?;

        let sessions = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_err("Failed to read session row"))?;
        Ok(sessions)
    }

    /// Look up a session by its exact id
    pub fn get_session(&self, session_id: &str) -> Result<Option<StoredSession>> {
        let conn = self.connect()?;

        let session = conn
            .query_row(
                "SELECT s.session_id, s.session_name, s.created_at, s.last_activity,
                        (SELECT COUNT(*) FROM messages m WHERE m.session_id = s.session_id)
                 FROM sessions s
                 WHERE s.session_id = ?",
                params![session_id],
                session_from_row,
            )
            .optional()
            .map_err(storage_err("Failed to query session"))?;
        Ok(session)
    }

    /// Resolve a full session id or a unique id prefix (e.g. the 8-char short id)
    ///
    /// Prefixes match case-insensitively. Returns `None` when nothing
    /// matches; an ambiguous prefix is an error.
    pub fn find_session(&self, id_or_prefix: &str) -> Result<Option<StoredSession>> {
        if let Some(session) = self.get_session(id_or_prefix)? {
            return Ok(Some(session));
        }
        if id_or_prefix.is_empty() {
            return Ok(None);
        }

        let prefix = id_or_prefix.to_lowercase();
        let mut matches: Vec<StoredSession> = self
            .list_sessions()?
            .into_iter()
            .filter(|s| s.session_id.to_lowercase().starts_with(&prefix))
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            n => Err(SqlChatError::Session(format!(
                "Session prefix '{}' is ambiguous ({} matches)",
                id_or_prefix, n
            ))
            .into()),
        }
    }

    /// Delete a session and all of its messages
    ///
    /// Returns whether a session row was removed; deleting an absent id is a
    /// no-op.
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let _guard = self.lock_writes()?;
        let mut conn = self.connect()?;

        let tx = conn
            .transaction()
            .map_err(storage_err("Failed to start transaction"))?;
        tx.execute(
            "DELETE FROM messages WHERE session_id = ?",
            params![session_id],
        )
        .map_err(storage_err("Failed to delete messages"))?;
        let removed = tx
            .execute(
                "DELETE FROM sessions WHERE session_id = ?",
                params![session_id],
            )
            .map_err(storage_err("Failed to delete session"))?;
        tx.commit()
            .map_err(storage_err("Failed to commit transaction"))?;

        Ok(removed > 0)
    }

    /// Delete every message of a session, keeping the session row
    pub fn clear_messages(&self, session_id: &str) -> Result<usize> {
        let _guard = self.lock_writes()?;
        let conn = self.connect()?;

        let removed = conn
            .execute(
                "DELETE FROM messages WHERE session_id = ?",
                params![session_id],
            )
            .map_err(storage_err("Failed to clear messages"))?;

        Ok(removed)
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSession> {
    let created_at: String = row.get(2)?;
    let last_activity: String = row.get(3)?;
    let message_count: i64 = row.get(4)?;
    Ok(StoredSession {
        session_id: row.get(0)?,
        session_name: row.get(1)?,
        created_at: parse_timestamp(&created_at),
        last_activity: parse_timestamp(&last_activity),
        message_count: message_count.max(0) as usize,
    })
}

//! Active-session state and session lifecycle
//!
//! [`SessionController`] owns the in-memory view of the session the user is
//! chatting in (its id, name and display messages) plus a cached listing of
//! every stored session. All mutations go through the [`SqliteStorage`] it
//! wraps, so memory and disk stay in step.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Local;
use uuid::Uuid;

use crate::error::{Result, SqlChatError};
use crate::storage::{Role, SqliteStorage, StoredMessage, StoredSession};

const FALLBACK_NAME_FORMAT: &str = "Session %d/%m %H:%M";

/// Name for a new session from the current local time
///
/// Falls back to `Session %d/%m %H:%M` when `format` is not a valid
/// `chrono` format string.
pub fn default_session_name(format: &str) -> String {
    let now = Local::now();
    let mut name = String::new();
    if write!(name, "{}", now.format(format)).is_err() {
        tracing::warn!("Invalid session name format: {}", format);
        name = now.format(FALLBACK_NAME_FORMAT).to_string();
    }
    name
}

/// A message as shown in the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Who wrote it
    pub role: Role,
    /// Markdown text
    pub content: String,
    /// Local display time (`%H:%M:%S`)
    pub timestamp: String,
}

impl From<StoredMessage> for ChatMessage {
    fn from(message: StoredMessage) -> Self {
        Self {
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
        }
    }
}

/// Startup options for [`SessionController::initialize`]
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Session id or unique prefix to resume
    pub preferred_session: Option<String>,
    /// `chrono` format used to name new sessions
    pub session_name_format: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            preferred_session: None,
            session_name_format: FALLBACK_NAME_FORMAT.to_string(),
        }
    }
}

/// Holds the active session and mediates every session operation
pub struct SessionController {
    storage: Arc<SqliteStorage>,
    session_id: String,
    session_name: String,
    messages: Vec<ChatMessage>,
    sessions: Vec<StoredSession>,
    name_format: String,
}

impl SessionController {
    /// Load sessions from `storage` and pick the active one
    ///
    /// Creates a session when the store is empty. The preferred session is
    /// used when it resolves; otherwise the most recently created session
    /// becomes active.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read or written
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use sqlchat::session::{SessionController, SessionOptions};
    /// use sqlchat::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = Arc::new(SqliteStorage::new_with_path(dir.path().join("s.db")).unwrap());
    /// let controller = SessionController::initialize(storage, SessionOptions::default()).unwrap();
    /// assert_eq!(controller.sessions().len(), 1);
    /// assert!(controller.messages().is_empty());
    /// ```
    pub fn initialize(storage: Arc<SqliteStorage>, options: SessionOptions) -> Result<Self> {
        let mut controller = Self {
            storage,
            session_id: String::new(),
            session_name: String::new(),
            messages: Vec::new(),
            sessions: Vec::new(),
            name_format: options.session_name_format,
        };

        controller.refresh_sessions()?;
        if controller.sessions.is_empty() {
            tracing::info!("No stored sessions, creating the first one");
            controller.create_session()?;
            return Ok(controller);
        }

        let preferred = match options.preferred_session.as_deref() {
            Some(wanted) => {
                let found = controller.storage.find_session(wanted)?;
                if found.is_none() {
                    tracing::warn!("Session '{}' not found, using the newest one", wanted);
                }
                found
            }
            None => None,
        };

        let active = match preferred {
            Some(session) => session,
            None => controller
                .sessions
                .iter()
                .max_by(|a, b| a.created_at.cmp(&b.created_at))
                .cloned()
                .ok_or_else(|| SqlChatError::Session("No sessions available".to_string()))?,
        };

        controller.switch_session(&active.session_id, &active.session_name)?;
        Ok(controller)
    }

    /// Make `session_id` active and reload its messages from the store
    pub fn switch_session(&mut self, session_id: &str, session_name: &str) -> Result<()> {
        let messages = self.storage.list_messages(session_id)?;
        self.session_id = session_id.to_string();
        self.session_name = session_name.to_string();
        self.messages = messages.into_iter().map(ChatMessage::from).collect();
        tracing::debug!(
            session_id = %self.session_id,
            messages = self.messages.len(),
            "Switched session"
        );
        Ok(())
    }

    /// Switch to the session matching a full id or unique prefix
    ///
    /// # Errors
    ///
    /// Returns [`SqlChatError::Session`] if nothing matches
    pub fn switch_to(&mut self, id_or_prefix: &str) -> Result<StoredSession> {
        let session = self
            .storage
            .find_session(id_or_prefix)?
            .ok_or_else(|| {
                SqlChatError::Session(format!("No session matches '{}'", id_or_prefix))
            })?;
        self.switch_session(&session.session_id, &session.session_name)?;
        Ok(session)
    }

    /// Create, persist and activate a new session; returns its id
    pub fn create_session(&mut self) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let session_name = default_session_name(&self.name_format);

        self.storage
            .create_or_update_session(&session_id, &session_name)?;
        tracing::info!(session_id = %session_id, name = %session_name, "Created session");

        self.session_id = session_id.clone();
        self.session_name = session_name;
        self.messages.clear();
        self.refresh_sessions()?;
        Ok(session_id)
    }

    /// Rename the active session
    ///
    /// Returns `false` when the trimmed name is empty or unchanged; nothing is
    /// written in that case.
    pub fn rename_active(&mut self, new_name: &str) -> Result<bool> {
        let new_name = new_name.trim();
        if new_name.is_empty() || new_name == self.session_name {
            return Ok(false);
        }

        self.storage
            .create_or_update_session(&self.session_id, new_name)?;
        self.session_name = new_name.to_string();
        self.refresh_sessions()?;
        Ok(true)
    }

    /// Delete a non-active session; returns what was deleted
    ///
    /// # Errors
    ///
    /// Returns [`SqlChatError::Session`] if the id is unknown, names the
    /// active session, or names the only remaining session
    pub fn delete_session(&mut self, id_or_prefix: &str) -> Result<StoredSession> {
        let session = self
            .storage
            .find_session(id_or_prefix)?
            .ok_or_else(|| {
                SqlChatError::Session(format!("No session matches '{}'", id_or_prefix))
            })?;

        self.refresh_sessions()?;
        if self.sessions.len() <= 1 {
            return Err(
                SqlChatError::Session("Cannot delete the only remaining session".to_string())
                    .into(),
            );
        }
        if session.session_id == self.session_id {
            return Err(SqlChatError::Session(
                "Cannot delete the active session; switch to another one first".to_string(),
            )
            .into());
        }

        self.storage.delete_session(&session.session_id)?;
        tracing::info!(session_id = %session.session_id, "Deleted session");
        self.refresh_sessions()?;
        Ok(session)
    }

    /// Remove every message of the active session; returns how many
    pub fn clear_messages(&mut self) -> Result<usize> {
        let removed = self.storage.clear_messages(&self.session_id)?;
        self.messages.clear();
        self.refresh_sessions()?;
        Ok(removed)
    }

    /// Append a message to `session_id`
    ///
    /// The in-memory transcript is only touched while `session_id` is still
    /// active. It is updated before the write, so a storage failure never
    /// hides a message from the user.
    pub fn record_message(
        &mut self,
        session_id: &str,
        role: Role,
        content: &str,
        timestamp: &str,
    ) -> Result<()> {
        if session_id == self.session_id {
            self.messages.push(ChatMessage {
                role,
                content: content.to_string(),
                timestamp: timestamp.to_string(),
            });
        }
        self.storage
            .append_message(session_id, role, content, timestamp)?;
        Ok(())
    }

    /// Reload the cached session listing
    pub fn refresh_sessions(&mut self) -> Result<()> {
        self.sessions = self.storage.list_sessions()?;
        Ok(())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Cached listing, most recently active first
    pub fn sessions(&self) -> &[StoredSession] {
        &self.sessions
    }

    pub fn storage(&self) -> &Arc<SqliteStorage> {
        &self.storage
    }
}

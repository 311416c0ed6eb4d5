use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing queries
    User,
    /// The analytics backend's reply
    Assistant,
}

impl Role {
    /// Column value stored in the `messages.role` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a stored role column value
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a stored conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Unique identifier for the session
    pub session_id: String,
    /// User-editable display name
    pub session_name: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Updated on rename and on every message write
    pub last_activity: DateTime<Utc>,
    /// Number of messages in the session
    pub message_count: usize,
}

impl StoredSession {
    /// First 8 characters of the id, as shown in listings
    pub fn short_id(&self) -> &str {
        self.session_id
            .char_indices()
            .nth(8)
            .map(|(idx, _)| &self.session_id[..idx])
            .unwrap_or(&self.session_id)
    }
}

/// A persisted message row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Autoincrement row id
    pub id: i64,
    /// Owning session
    pub session_id: String,
    /// Message author
    pub role: Role,
    /// Message text (markdown)
    pub content: String,
    /// Display-formatted local time
    pub timestamp: String,
    /// Insertion time, used for ordering
    pub created_at: DateTime<Utc>,
}

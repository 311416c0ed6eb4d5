//! Error types for sqlchat
//!
//! This module defines the error taxonomy used throughout the client,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for sqlchat operations
///
/// Network and protocol failures are normally absorbed by the API client
/// and surfaced as status values or stream events; the variants here are
/// what escapes to callers.
#[derive(Error, Debug)]
pub enum SqlChatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote API unreachable or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed line in the query event stream
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Local persistence errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid session action (unknown id, deleting the active session, ...)
    #[error("Session error: {0}")]
    Session(String),

    /// A query was submitted while the API is not healthy
    #[error("API is not available (status: {0})")]
    ApiUnavailable(String),

    /// A query was submitted while another turn is still in flight
    #[error("A query is already being processed")]
    TurnInFlight,

    /// A blank query was submitted
    #[error("Query cannot be empty")]
    EmptyQuery,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Line editor errors
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

/// Result type alias for sqlchat operations
///
/// Uses `anyhow::Error` so call sites can attach context; the typed
/// [`SqlChatError`] is recovered with `downcast_ref` where it matters.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = SqlChatError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_network_error_display() {
        let error = SqlChatError::Network("connection refused".to_string());
        assert_eq!(error.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_protocol_error_display() {
        let error = SqlChatError::Protocol("expected value at line 1".to_string());
        assert_eq!(
            error.to_string(),
            "Protocol error: expected value at line 1"
        );
    }

    #[test]
    fn test_storage_error_display() {
        let error = SqlChatError::Storage("database connection failed".to_string());
        assert_eq!(
            error.to_string(),
            "Storage error: database connection failed"
        );
    }

    #[test]
    fn test_session_error_display() {
        let error = SqlChatError::Session("cannot delete the active session".to_string());
        assert_eq!(
            error.to_string(),
            "Session error: cannot delete the active session"
        );
    }

    #[test]
    fn test_api_unavailable_display() {
        let error = SqlChatError::ApiUnavailable("offline".to_string());
        assert_eq!(error.to_string(), "API is not available (status: offline)");
    }

    #[test]
    fn test_turn_in_flight_display() {
        assert_eq!(
            SqlChatError::TurnInFlight.to_string(),
            "A query is already being processed"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: SqlChatError = io_error.into();
        assert!(matches!(error, SqlChatError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: SqlChatError = json_error.into();
        assert!(matches!(error, SqlChatError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: SqlChatError = yaml_error.into();
        assert!(matches!(error, SqlChatError::Yaml(_)));
    }

    #[test]
    fn test_typed_error_survives_anyhow() {
        let err: anyhow::Error = SqlChatError::TurnInFlight.into();
        assert!(matches!(
            err.downcast_ref::<SqlChatError>(),
            Some(SqlChatError::TurnInFlight)
        ));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqlChatError>();
    }
}

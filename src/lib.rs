//! sqlchat - terminal chat client for a streaming SQL-analytics API
//!
//! This library provides the pieces behind the `sqlchat` binary: a local
//! session store, a client for the remote analytics API, and the turn state
//! machine that ties them together.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: SQLite persistence of sessions and their messages
//! - `api`: Analytics API abstraction, HTTP client and stream decoder
//! - `session`: The active session and session lifecycle
//! - `orchestrator`: Per-turn state machine with cancellation
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers behind each CLI command
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sqlchat::api::HttpApiClient;
//! use sqlchat::orchestrator::ChatOrchestrator;
//! use sqlchat::session::{SessionController, SessionOptions};
//! use sqlchat::storage::SqliteStorage;
//! use sqlchat::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let storage = Arc::new(SqliteStorage::new()?);
//!     let session = SessionController::initialize(storage, SessionOptions::default())?;
//!     let api = Arc::new(HttpApiClient::new(&config.api)?);
//!     let chat = ChatOrchestrator::new(api, session, config.chat.default_model.clone());
//!
//!     chat.refresh_health().await;
//!     let outcome = chat.submit("How many orders shipped last week?").await?;
//!     println!("{}", outcome.reply);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use api::{AnalyticsApi, HttpApiClient};
pub use config::Config;
pub use error::{Result, SqlChatError};
pub use orchestrator::{ChatOrchestrator, TurnOutcome, TurnState, TurnTerminal};
pub use session::{ChatMessage, SessionController};
pub use storage::SqliteStorage;

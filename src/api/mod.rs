//! Analytics API abstraction and implementations
//!
//! [`AnalyticsApi`] is the seam between the chat orchestrator and the remote
//! SQL-analytics backend. Concrete implementations live in submodules:
//!
//! - [`client::HttpApiClient`] -- talks to the backend over HTTP with
//!   `reqwest` and decodes the streamed query events.
//! - [`fake::FakeApi`] -- in-process fake used in tests (cfg(test) only).
//!
//! Apart from `list_models`, network and HTTP failures are folded into the
//! returned values ([`HealthStatus::Offline`], [`ClearSessionResult::failed`]
//! or a terminal [`StreamEvent::Error`]).

use async_trait::async_trait;

use crate::error::Result;

pub mod client;
pub mod sse;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use client::HttpApiClient;
pub use sse::EventStream;
pub use types::{ClearSessionResult, HealthStatus, ModelCatalog, QueryRequest, StreamEvent};

/// Operations the chat client needs from the analytics backend.
///
/// # Examples
///
/// ```no_run
/// use sqlchat::api::{AnalyticsApi, HttpApiClient};
/// use sqlchat::config::ApiConfig;
///
/// # async fn example() -> sqlchat::error::Result<()> {
/// let api = HttpApiClient::new(&ApiConfig::default())?;
/// println!("API is {}", api.check_health().await);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    /// Probe `GET /health`. Never fails; unreachable maps to `Offline`.
    async fn check_health(&self) -> HealthStatus;

    /// Fetch `GET /models`.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-200, or an unreadable body.
    /// Callers treat this as non-fatal and keep their previous catalog.
    async fn list_models(&self) -> Result<ModelCatalog>;

    /// Ask the backend to forget a session's conversation memory.
    async fn clear_remote_session(&self, session_id: &str) -> ClearSessionResult;

    /// Open the streaming `POST /sql-query` for one turn.
    ///
    /// The returned stream ends after the first terminal event, or when the
    /// response body ends.
    async fn stream_query(&self, request: &QueryRequest) -> Result<EventStream>;
}

//! Per-turn chat state machine
//!
//! A turn takes one user query through
//! `Idle → AwaitingUserInput → Streaming → Terminal → Idle`:
//!
//! 1. The query is validated and the in-flight check is taken atomically.
//! 2. The user message is recorded.
//! 3. Stream events update the transient progress text.
//! 4. The first terminal event, the end of the stream or a cancellation
//!    produces exactly one assistant message.
//!
//! State changes are published on a [`tokio::sync::watch`] channel so a UI
//! can redraw progress without polling.

use std::sync::Arc;

use chrono::Local;
use futures::StreamExt;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::api::{
    AnalyticsApi, ClearSessionResult, HealthStatus, ModelCatalog, QueryRequest, StreamEvent,
};
use crate::error::{Result, SqlChatError};
use crate::session::SessionController;
use crate::storage::Role;

/// Shown while streaming until the backend sends its own progress text
pub const DEFAULT_PROGRESS: &str = "Processing your query...";

const NO_RESPONSE: &str = "No response received";
const UNKNOWN_ERROR: &str = "Unknown error";
const TIMEOUT_MESSAGE: &str = "**Timeout:** The query took too long to respond.";
const CANCELLED_MESSAGE: &str = "**Cancelled:** The query was cancelled before completion.";

/// Where the current turn is
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingUserInput,
    Streaming {
        /// Latest progress text, `None` before the first `processing` event
        progress: Option<String>,
    },
    Terminal(TurnTerminal),
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTerminal {
    Completed,
    Error(TurnErrorKind),
    /// The stream ended without a terminal event
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnErrorKind {
    /// The backend sent an `error` event
    Remote,
    /// The query request could not be issued
    Unexpected,
    Cancelled,
}

/// Result of a finished turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Session the turn was attached to
    pub session_id: String,
    pub terminal: TurnTerminal,
    /// Text of the assistant message that closed the turn
    pub reply: String,
    /// Display time shared by the user and assistant messages
    pub timestamp: String,
    /// Store failures hit while recording messages; the turn still finished
    pub persistence_errors: Vec<String>,
}

/// Resets the turn state to `Idle` however the turn ends
struct IdleGuard<'a>(&'a watch::Sender<TurnState>);

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(TurnState::Idle);
    }
}

/// Coordinates the API, the active session and the turn state
pub struct ChatOrchestrator {
    api: Arc<dyn AnalyticsApi>,
    session: Arc<Mutex<SessionController>>,
    status: RwLock<HealthStatus>,
    catalog: RwLock<ModelCatalog>,
    model: RwLock<String>,
    state: watch::Sender<TurnState>,
}

impl ChatOrchestrator {
    /// Create an orchestrator; the API status starts as `Unknown`
    pub fn new(
        api: Arc<dyn AnalyticsApi>,
        session: SessionController,
        default_model: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(TurnState::Idle);
        Self {
            api,
            session: Arc::new(Mutex::new(session)),
            status: RwLock::new(HealthStatus::Unknown),
            catalog: RwLock::new(ModelCatalog::default()),
            model: RwLock::new(default_model.into()),
            state,
        }
    }

    /// Run one turn for `query`
    ///
    /// See [`ChatOrchestrator::submit_with_cancel`].
    pub async fn submit(&self, query: &str) -> Result<TurnOutcome> {
        self.submit_with_cancel(query, CancellationToken::new()).await
    }

    /// Run one turn for `query`, aborting the stream when `cancel` fires
    ///
    /// # Errors
    ///
    /// Returns [`SqlChatError::EmptyQuery`], [`SqlChatError::ApiUnavailable`]
    /// or [`SqlChatError::TurnInFlight`] before anything is recorded. Once
    /// the user message is recorded the turn always completes with an
    /// outcome.
    pub async fn submit_with_cancel(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SqlChatError::EmptyQuery.into());
        }

        let status = *self.status.read().await;
        if !status.is_healthy() {
            return Err(SqlChatError::ApiUnavailable(status.to_string()).into());
        }

        let started = self.state.send_if_modified(|state| {
            if *state == TurnState::Idle {
                *state = TurnState::AwaitingUserInput;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(SqlChatError::TurnInFlight.into());
        }
        let _idle = IdleGuard(&self.state);

        let session_id = self.session.lock().await.session_id().to_string();
        // Both messages carry the time the query was submitted.
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        let mut persistence_errors = Vec::new();

        self.record(&session_id, Role::User, query, &timestamp, &mut persistence_errors)
            .await;

        let model_id = self.model.read().await.clone();
        let request = QueryRequest::new(query, session_id.as_str(), model_id);
        self.state
            .send_replace(TurnState::Streaming { progress: None });
        tracing::info!(session_id = %session_id, model_id = %request.model_id, "Submitting query");

        let (terminal, reply) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(session_id = %session_id, "Query cancelled");
                (
                    TurnTerminal::Error(TurnErrorKind::Cancelled),
                    CANCELLED_MESSAGE.to_string(),
                )
            }
            result = self.drive_stream(&request) => result,
        };

        self.record(
            &session_id,
            Role::Assistant,
            &reply,
            &timestamp,
            &mut persistence_errors,
        )
        .await;
        self.state.send_replace(TurnState::Terminal(terminal));
        tracing::debug!(session_id = %session_id, ?terminal, "Turn finished");

        Ok(TurnOutcome {
            session_id,
            terminal,
            reply,
            timestamp,
            persistence_errors,
        })
    }

    async fn drive_stream(&self, request: &QueryRequest) -> (TurnTerminal, String) {
        let mut stream = match self.api.stream_query(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Query could not be issued: {:#}", e);
                return (
                    TurnTerminal::Error(TurnErrorKind::Unexpected),
                    format!("**Unexpected error:** {}", e),
                );
            }
        };

        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Processing { message } => {
                    let progress = message.unwrap_or_else(|| DEFAULT_PROGRESS.to_string());
                    tracing::debug!(progress = %progress, "Query progress");
                    self.state.send_replace(TurnState::Streaming {
                        progress: Some(progress),
                    });
                }
                StreamEvent::Completed { reasoning } => {
                    return (
                        TurnTerminal::Completed,
                        reasoning.unwrap_or_else(|| NO_RESPONSE.to_string()),
                    );
                }
                StreamEvent::Error { error } => {
                    return (
                        TurnTerminal::Error(TurnErrorKind::Remote),
                        format!(
                            "**Error:** {}",
                            error.as_deref().unwrap_or(UNKNOWN_ERROR)
                        ),
                    );
                }
            }
        }

        tracing::warn!("Query stream ended without a final event");
        (TurnTerminal::Timeout, TIMEOUT_MESSAGE.to_string())
    }

    async fn record(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        timestamp: &str,
        errors: &mut Vec<String>,
    ) {
        let mut session = self.session.lock().await;
        if let Err(e) = session.record_message(session_id, role, content, timestamp) {
            tracing::error!(
                session_id = %session_id,
                role = %role,
                "Failed to persist message: {:#}",
                e
            );
            errors.push(format!("{:#}", e));
        }
    }

    /// Probe the API and remember the result
    pub async fn refresh_health(&self) -> HealthStatus {
        let status = self.api.check_health().await;
        *self.status.write().await = status;
        tracing::debug!(%status, "API health refreshed");
        status
    }

    /// Last observed API status
    pub async fn api_status(&self) -> HealthStatus {
        *self.status.read().await
    }

    /// Re-fetch the model catalog, keeping the previous one on failure
    ///
    /// When a non-empty catalog does not offer the selected model, the first
    /// offered model becomes the selection.
    pub async fn refresh_models(&self) -> ModelCatalog {
        match self.api.list_models().await {
            Ok(catalog) => {
                *self.catalog.write().await = catalog.clone();
                let mut model = self.model.write().await;
                if !catalog.contains(&model) {
                    if let Some(first) = catalog.qualified_ids().into_iter().next() {
                        tracing::info!(
                            previous = %model.as_str(),
                            model_id = %first,
                            "Selected model not offered, switching to first available"
                        );
                        *model = first;
                    }
                }
                catalog
            }
            Err(e) => {
                tracing::warn!("Keeping previous model catalog: {:#}", e);
                self.catalog.read().await.clone()
            }
        }
    }

    pub async fn models(&self) -> ModelCatalog {
        self.catalog.read().await.clone()
    }

    /// Choose the model for subsequent turns
    ///
    /// # Errors
    ///
    /// Returns [`SqlChatError::Config`] when the catalog is known and does not
    /// list `model_id`
    pub async fn select_model(&self, model_id: &str) -> Result<()> {
        let catalog = self.catalog.read().await;
        if !catalog.is_empty() && !catalog.contains(model_id) {
            return Err(SqlChatError::Config(format!("Unknown model: {}", model_id)).into());
        }
        drop(catalog);

        *self.model.write().await = model_id.to_string();
        tracing::info!(model_id = %model_id, "Model selected");
        Ok(())
    }

    pub async fn selected_model(&self) -> String {
        self.model.read().await.clone()
    }

    /// Ask the backend to forget the active session's conversation
    pub async fn clear_remote_session(&self) -> ClearSessionResult {
        let session_id = self.session.lock().await.session_id().to_string();
        let result = self.api.clear_remote_session(&session_id).await;
        if !result.is_ok() {
            tracing::warn!(session_id = %session_id, error = ?result.error, "Remote clear failed");
        }
        result
    }

    /// Watch turn state changes
    pub fn subscribe(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TurnState {
        self.state.borrow().clone()
    }

    /// Whether a turn is in flight
    pub fn is_busy(&self) -> bool {
        *self.state.borrow() != TurnState::Idle
    }

    /// Shared handle to the session controller
    pub fn session(&self) -> Arc<Mutex<SessionController>> {
        Arc::clone(&self.session)
    }
}

//! In-process fake analytics API for unit tests
//!
//! [`FakeApi`] implements [`AnalyticsApi`] without any network I/O. Tests
//! script the health status, the model catalog and one [`ScriptedStream`] per
//! expected `stream_query` call, then inspect what the code under test sent.
//!
//! ```text
//! orchestrator.submit() -> stream_query() -> next ScriptedStream (FIFO)
//!                                         -> request recorded in requests()
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::api::sse::EventStream;
use crate::api::types::{ClearSessionResult, HealthStatus, ModelCatalog, QueryRequest, StreamEvent};
use crate::api::AnalyticsApi;
use crate::error::{Result, SqlChatError};

/// What one `stream_query` call yields
pub enum ScriptedStream {
    /// A fixed sequence of events, then end of stream
    Events(Vec<StreamEvent>),
    /// Events pushed by the test through the paired sender
    Channel(mpsc::UnboundedReceiver<StreamEvent>),
    /// A stream that never yields
    Pending,
    /// `stream_query` itself fails with this message
    Fail(String),
}

impl ScriptedStream {
    /// Channel-backed script plus the sender that feeds it
    pub fn channel() -> (Self, mpsc::UnboundedSender<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::Channel(rx), tx)
    }
}

/// Scriptable [`AnalyticsApi`] implementation
pub struct FakeApi {
    health: Mutex<HealthStatus>,
    models: Mutex<Option<ModelCatalog>>,
    streams: Mutex<VecDeque<ScriptedStream>>,
    requests: Mutex<Vec<QueryRequest>>,
    cleared: Mutex<Vec<String>>,
}

impl FakeApi {
    /// A healthy fake with an empty catalog and no scripted streams
    pub fn healthy() -> Self {
        Self::with_health(HealthStatus::Healthy)
    }

    /// A fake reporting `health`
    pub fn with_health(health: HealthStatus) -> Self {
        Self {
            health: Mutex::new(health),
            models: Mutex::new(Some(ModelCatalog::default())),
            streams: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
        }
    }

    /// Change the reported health
    pub fn set_health(&self, health: HealthStatus) {
        *self.health.lock().unwrap() = health;
    }

    /// Serve `catalog` from `list_models`, or fail when `None`
    pub fn set_models(&self, catalog: Option<ModelCatalog>) {
        *self.models.lock().unwrap() = catalog;
    }

    /// Queue the script for the next `stream_query` call
    pub fn push_stream(&self, script: ScriptedStream) {
        self.streams.lock().unwrap().push_back(script);
    }

    /// Requests received by `stream_query`, oldest first
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Session ids passed to `clear_remote_session`
    pub fn cleared_sessions(&self) -> Vec<String> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsApi for FakeApi {
    async fn check_health(&self) -> HealthStatus {
        *self.health.lock().unwrap()
    }

    async fn list_models(&self) -> Result<ModelCatalog> {
        self.models
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SqlChatError::Network("models unavailable".to_string()).into())
    }

    async fn clear_remote_session(&self, session_id: &str) -> ClearSessionResult {
        self.cleared.lock().unwrap().push(session_id.to_string());
        ClearSessionResult {
            status: "success".to_string(),
            error: None,
        }
    }

    async fn stream_query(&self, request: &QueryRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedStream::Events(Vec::new()));

        match script {
            ScriptedStream::Events(events) => Ok(Box::pin(futures::stream::iter(events))),
            ScriptedStream::Channel(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            ScriptedStream::Pending => Ok(Box::pin(futures::stream::pending())),
            ScriptedStream::Fail(message) => Err(SqlChatError::Network(message).into()),
        }
    }
}

//! Wire types for the analytics API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reachability of the analytics API as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// `/health` answered 200 with `status: healthy`
    Healthy,
    /// Network failure, non-200, or unreadable body
    Offline,
    /// Not checked yet, or the server reported something other than healthy
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Map the `status` field of a 200 `/health` body to a tag
    pub fn from_reported(status: Option<&str>) -> Self {
        match status {
            Some("healthy") => Self::Healthy,
            _ => Self::Unknown,
        }
    }

    /// Whether queries may be submitted
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Human-readable label for status displays
    pub fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "Online",
            Self::Offline => "Offline",
            Self::Unknown => "Checking",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Offline => write!(f, "offline"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Deserialize)]
pub(crate) struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
}

/// Models offered by the backend, grouped by provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    providers: BTreeMap<String, Vec<String>>,
}

impl ModelCatalog {
    /// Build a catalog from a provider → model ids map
    pub fn new(providers: BTreeMap<String, Vec<String>>) -> Self {
        Self { providers }
    }

    /// Provider → model ids
    pub fn providers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.providers
    }

    /// All models as `provider:model` identifiers, provider-sorted
    pub fn qualified_ids(&self) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(|(provider, models)| {
                models
                    .iter()
                    .map(move |model| format!("{}:{}", provider, model))
            })
            .collect()
    }

    /// Whether `qualified_id` (`provider:model`) is offered
    pub fn contains(&self, qualified_id: &str) -> bool {
        match qualified_id.split_once(':') {
            Some((provider, model)) => self
                .providers
                .get(provider)
                .is_some_and(|models| models.iter().any(|m| m == model)),
            None => false,
        }
    }

    /// True when no provider lists any model
    pub fn is_empty(&self) -> bool {
        self.providers.values().all(|models| models.is_empty())
    }
}

/// Body of `GET /models`
#[derive(Debug, Deserialize)]
pub(crate) struct ModelsResponse {
    #[serde(default)]
    pub models: ModelCatalog,
}

/// Outcome of `POST /clear-session/{id}`
///
/// Failures are captured here instead of being returned as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSessionResult {
    /// Status reported by the server, or `"error"`
    pub status: String,
    /// Error description when the call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClearSessionResult {
    /// Build a failed result
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(error.into()),
        }
    }

    /// Whether the backend acknowledged the clear
    pub fn is_ok(&self) -> bool {
        self.status != "error" && self.error.is_none()
    }
}

/// Request body for `POST /sql-query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Natural-language question
    pub query: String,
    /// Conversation the backend should attach the query to
    pub session_id: String,
    /// `provider:model` identifier
    pub model_id: String,
    /// Always `true`; the client only speaks the streaming protocol
    pub stream: bool,
    /// Always `false`
    pub debug_mode: bool,
}

impl QueryRequest {
    /// Build a streaming request
    pub fn new(
        query: impl Into<String>,
        session_id: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            session_id: session_id.into(),
            model_id: model_id.into(),
            stream: true,
            debug_mode: false,
        }
    }
}

/// A decoded status event from the query stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Work in progress, with an optional progress text
    Processing {
        #[serde(default)]
        message: Option<String>,
    },
    /// Final answer; ends the stream
    Completed {
        #[serde(default)]
        reasoning: Option<String>,
    },
    /// Failure; ends the stream
    Error {
        #[serde(default)]
        error: Option<String>,
    },
}

impl StreamEvent {
    /// Shorthand for an error event carrying `text`
    pub fn error(text: impl Into<String>) -> Self {
        Self::Error {
            error: Some(text.into()),
        }
    }

    /// `completed` and `error` end the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing { .. })
    }
}

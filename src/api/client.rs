//! HTTP implementation of [`AnalyticsApi`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::api::sse::{decode_event_stream, EventStream};
use crate::api::types::{
    ClearSessionResult, HealthResponse, HealthStatus, ModelCatalog, ModelsResponse, QueryRequest,
    StreamEvent,
};
use crate::api::AnalyticsApi;
use crate::config::ApiConfig;
use crate::error::{Result, SqlChatError};

/// `reqwest`-backed client for the analytics API
///
/// Each endpoint uses its own per-request timeout from [`ApiConfig`]; the
/// streaming query timeout bounds the whole response, body included.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
    health_timeout: Duration,
    models_timeout: Duration,
    clear_timeout: Duration,
    query_timeout: Duration,
}

impl HttpApiClient {
    /// Create a client for `config.base_url`
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use sqlchat::api::HttpApiClient;
    /// use sqlchat::config::ApiConfig;
    ///
    /// let client = HttpApiClient::new(&ApiConfig::default()).unwrap();
    /// assert_eq!(client.base_url(), "http://localhost:8000");
    /// ```
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("sqlchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SqlChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        tracing::info!("Initialized analytics API client: base_url={}", base_url);

        Ok(Self {
            client,
            base_url,
            health_timeout: Duration::from_secs(config.health_timeout_seconds),
            models_timeout: Duration::from_secs(config.models_timeout_seconds),
            clear_timeout: Duration::from_secs(config.clear_timeout_seconds),
            query_timeout: Duration::from_secs(config.query_timeout_seconds),
        })
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AnalyticsApi for HttpApiClient {
    async fn check_health(&self) -> HealthStatus {
        let url = self.endpoint("/health");
        let response = match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Health check failed: {}", e);
                return HealthStatus::Offline;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::debug!("Health check returned HTTP {}", response.status());
            return HealthStatus::Offline;
        }

        match response.json::<HealthResponse>().await {
            Ok(body) => HealthStatus::from_reported(body.status.as_deref()),
            Err(e) => {
                tracing::warn!("Unreadable health response: {}", e);
                HealthStatus::Offline
            }
        }
    }

    async fn list_models(&self) -> Result<ModelCatalog> {
        let url = self.endpoint("/models");
        let response = self
            .client
            .get(&url)
            .timeout(self.models_timeout)
            .send()
            .await
            .map_err(|e| SqlChatError::Network(format!("GET /models failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(
                SqlChatError::Network(format!("GET /models returned HTTP {}", status)).into(),
            );
        }

        let body: ModelsResponse = response.json().await.map_err(|e| {
            SqlChatError::Protocol(format!("Failed to parse models response: {}", e))
        })?;
        tracing::debug!(
            providers = body.models.providers().len(),
            "Fetched model catalog"
        );
        Ok(body.models)
    }

    async fn clear_remote_session(&self, session_id: &str) -> ClearSessionResult {
        let url = self.endpoint(&format!("/clear-session/{}", session_id));
        let response = match self
            .client
            .post(&url)
            .timeout(self.clear_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ClearSessionResult::failed(e.to_string()),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return ClearSessionResult::failed(format!("HTTP {}", status.as_u16()));
        }

        match response.json::<ClearSessionResult>().await {
            Ok(result) => result,
            Err(e) => ClearSessionResult::failed(format!("Unreadable response: {}", e)),
        }
    }

    async fn stream_query(&self, request: &QueryRequest) -> Result<EventStream> {
        let url = self.endpoint("/sql-query");
        tracing::debug!(
            session_id = %request.session_id,
            model_id = %request.model_id,
            "Opening query stream"
        );

        let response = match self
            .client
            .post(&url)
            .timeout(self.query_timeout)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Query request failed: {}", e);
                return Ok(single_event(StreamEvent::error(e.to_string())));
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Ok(single_event(StreamEvent::error(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            ))));
        }

        Ok(decode_event_stream(response.bytes_stream()))
    }
}

fn single_event(event: StreamEvent) -> EventStream {
    Box::pin(futures::stream::once(async move { event }))
}

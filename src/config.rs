//! Configuration management for sqlchat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, SqlChatError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for sqlchat
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote analytics API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Local session store settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chat behavior settings
    #[serde(default)]
    pub chat: ChatConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote analytics API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL the endpoint paths are appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for `GET /health` (seconds)
    #[serde(default = "default_health_timeout")]
    pub health_timeout_seconds: u64,

    /// Timeout for `GET /models` (seconds)
    #[serde(default = "default_models_timeout")]
    pub models_timeout_seconds: u64,

    /// Timeout for `POST /clear-session/{id}` (seconds)
    #[serde(default = "default_clear_timeout")]
    pub clear_timeout_seconds: u64,

    /// Timeout for the streaming `POST /sql-query` (seconds)
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_health_timeout() -> u64 {
    5
}

fn default_models_timeout() -> u64 {
    10
}

fn default_clear_timeout() -> u64 {
    10
}

fn default_query_timeout() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            health_timeout_seconds: default_health_timeout(),
            models_timeout_seconds: default_models_timeout(),
            clear_timeout_seconds: default_clear_timeout(),
            query_timeout_seconds: default_query_timeout(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Explicit database path; the platform data directory is used when unset
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model used until the user selects another one (`provider:model`)
    #[serde(default = "default_model")]
    pub default_model: String,

    /// `chrono` format string for names of newly created sessions
    #[serde(default = "default_session_name_format")]
    pub session_name_format: String,

    /// Number of readline history entries kept in memory
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

fn default_model() -> String {
    "openai:gpt-4o-mini".to_string()
}

fn default_session_name_format() -> String {
    "Session %d/%m %H:%M".to_string()
}

fn default_history_size() -> usize {
    500
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            session_name_format: default_session_name_format(),
            history_size: default_history_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level for the `sqlchat` target (`trace` .. `error`)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SqlChatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SqlChatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("SQLCHAT_API_URL") {
            tracing::debug!(base_url = %base_url, "Env override: SQLCHAT_API_URL");
            self.api.base_url = base_url;
        }

        if let Ok(model) = std::env::var("SQLCHAT_MODEL") {
            self.chat.default_model = model;
        }

        if let Ok(timeout) = std::env::var("SQLCHAT_QUERY_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.query_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid SQLCHAT_QUERY_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(db_path) = std::env::var("SQLCHAT_SESSIONS_DB") {
            self.storage.db_path = Some(PathBuf::from(db_path));
        }

        if let Ok(level) = std::env::var("SQLCHAT_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(api_url) = &cli.api_url {
            self.api.base_url = api_url.clone();
        }
        if let Some(storage_path) = &cli.storage_path {
            self.storage.db_path = Some(PathBuf::from(storage_path));
        }
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.api.base_url).map_err(|e| {
            SqlChatError::Config(format!(
                "api.base_url is not a valid URL ({}): {}",
                self.api.base_url, e
            ))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(SqlChatError::Config(format!(
                "api.base_url must use http or https, got {}",
                base.scheme()
            ))
            .into());
        }

        let timeouts = [
            ("api.health_timeout_seconds", self.api.health_timeout_seconds),
            ("api.models_timeout_seconds", self.api.models_timeout_seconds),
            ("api.clear_timeout_seconds", self.api.clear_timeout_seconds),
            ("api.query_timeout_seconds", self.api.query_timeout_seconds),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(
                    SqlChatError::Config(format!("{} must be greater than 0", name)).into(),
                );
            }
        }

        if self.chat.default_model.trim().is_empty() {
            return Err(
                SqlChatError::Config("chat.default_model cannot be empty".to_string()).into(),
            );
        }

        if self.chat.session_name_format.trim().is_empty() {
            return Err(SqlChatError::Config(
                "chat.session_name_format cannot be empty".to_string(),
            )
            .into());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(SqlChatError::Config(format!(
                "Invalid logging.level: {}. Must be one of: {}",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn bare_cli() -> crate::cli::Cli {
        crate::cli::Cli {
            config: None,
            verbose: false,
            api_url: None,
            storage_path: None,
            command: crate::cli::Commands::Health,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.health_timeout_seconds, 5);
        assert_eq!(config.api.models_timeout_seconds, 10);
        assert_eq!(config.api.query_timeout_seconds, 300);
        assert_eq!(config.chat.default_model, "openai:gpt-4o-mini");
        assert!(config.storage.db_path.is_none());
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_non_http_scheme() {
        let mut config = Config::default();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.api.query_timeout_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api.query_timeout_seconds"));
    }

    #[test]
    fn test_config_validation_empty_model() {
        let mut config = Config::default();
        config.chat.default_model = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
api:
  base_url: http://analytics.internal:9000
  query_timeout_seconds: 120
storage:
  db_path: /tmp/sqlchat/sessions.db
chat:
  default_model: anthropic:claude-3-haiku
logging:
  level: info
  json: true
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.base_url, "http://analytics.internal:9000");
        assert_eq!(config.api.query_timeout_seconds, 120);
        assert_eq!(config.api.health_timeout_seconds, 5);
        assert_eq!(
            config.storage.db_path,
            Some(PathBuf::from("/tmp/sqlchat/sessions.db"))
        );
        assert_eq!(config.chat.default_model, "anthropic:claude-3-haiku");
        assert_eq!(config.chat.session_name_format, "Session %d/%m %H:%M");
        assert!(config.logging.json);
    }

    #[test]
    fn test_example_config_parses() {
        let contents =
            std::fs::read_to_string("config/config.yaml").expect("read config/config.yaml");
        let config: Config = serde_yaml::from_str(&contents).expect("parse config/config.yaml");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        let config = Config::load("nonexistent.yaml", &bare_cli()).unwrap();
        assert_eq!(config.api.query_timeout_seconds, 300);
    }

    #[test]
    #[serial]
    fn test_env_overrides_applied() {
        std::env::set_var("SQLCHAT_API_URL", "http://env-host:8080");
        std::env::set_var("SQLCHAT_QUERY_TIMEOUT_SECONDS", "not-a-number");
        std::env::set_var("SQLCHAT_MODEL", "groq:llama3");

        let config = Config::load("nonexistent.yaml", &bare_cli()).unwrap();

        std::env::remove_var("SQLCHAT_API_URL");
        std::env::remove_var("SQLCHAT_QUERY_TIMEOUT_SECONDS");
        std::env::remove_var("SQLCHAT_MODEL");

        assert_eq!(config.api.base_url, "http://env-host:8080");
        assert_eq!(config.api.query_timeout_seconds, 300);
        assert_eq!(config.chat.default_model, "groq:llama3");
    }

    #[test]
    #[serial]
    fn test_cli_overrides_win_over_env() {
        std::env::set_var("SQLCHAT_API_URL", "http://env-host:8080");
        let mut cli = bare_cli();
        cli.api_url = Some("http://cli-host:7000".to_string());
        cli.storage_path = Some("/tmp/cli.db".to_string());
        cli.verbose = true;

        let config = Config::load("nonexistent.yaml", &cli).unwrap();
        std::env::remove_var("SQLCHAT_API_URL");

        assert_eq!(config.api.base_url, "http://cli-host:7000");
        assert_eq!(config.storage.db_path, Some(PathBuf::from("/tmp/cli.db")));
        assert_eq!(config.logging.level, "debug");
    }
}

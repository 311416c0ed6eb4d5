use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use sqlchat::config::ApiConfig;
use sqlchat::storage::SqliteStorage;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_storage() -> (Arc<SqliteStorage>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("sessions.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (Arc::new(storage), tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// API settings pointing at a mock server, with short timeouts
#[allow(dead_code)]
pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        health_timeout_seconds: 2,
        models_timeout_seconds: 2,
        clear_timeout_seconds: 2,
        query_timeout_seconds: 5,
    }
}

/// Join `data:` lines into a `text/event-stream` body
#[allow(dead_code)]
pub fn sse_body(events: &[&str]) -> Vec<u8> {
    events
        .iter()
        .map(|event| format!("data: {}\n\n", event))
        .collect::<String>()
        .into_bytes()
}

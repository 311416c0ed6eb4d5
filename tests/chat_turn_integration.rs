//! End-to-end chat turns: orchestrator + HTTP client + SQLite store

mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sqlchat::api::{HealthStatus, HttpApiClient};
use sqlchat::orchestrator::{ChatOrchestrator, TurnErrorKind, TurnState, TurnTerminal};
use sqlchat::session::{SessionController, SessionOptions};
use sqlchat::storage::{Role, SqliteStorage};
use sqlchat::SqlChatError;

async fn healthy_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;
    server
}

fn orchestrator_for(server: &MockServer, storage: Arc<SqliteStorage>) -> ChatOrchestrator {
    let session = SessionController::initialize(storage, SessionOptions::default())
        .expect("initialize session");
    let api = Arc::new(HttpApiClient::new(&common::api_config(&server.uri())).expect("client"));
    ChatOrchestrator::new(api, session, "openai:gpt-4o-mini")
}

async fn mount_stream(server: &MockServer, events: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/sql-query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(common::sse_body(events), "text/event-stream"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_completed_turn_is_persisted() {
    let server = healthy_server().await;
    mount_stream(
        &server,
        &[
            r#"{"status":"processing","message":"Planning"}"#,
            r#"{"status":"completed","reasoning":"There were 42 orders."}"#,
        ],
    )
    .await;
    let (storage, _dir) = common::create_temp_storage();
    let chat = orchestrator_for(&server, storage.clone());

    assert_eq!(chat.refresh_health().await, HealthStatus::Healthy);
    let outcome = chat.submit("How many orders?").await.unwrap();

    assert_eq!(outcome.terminal, TurnTerminal::Completed);
    assert_eq!(outcome.reply, "There were 42 orders.");
    assert_eq!(chat.state(), TurnState::Idle);

    let stored = storage.list_messages(&outcome.session_id).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].role, Role::User);
    assert_eq!(stored[0].content, "How many orders?");
    assert_eq!(stored[1].content, "There were 42 orders.");

    let sessions = storage.list_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].message_count, 2);
}

#[tokio::test]
async fn test_remote_error_is_persisted_as_message() {
    let server = healthy_server().await;
    mount_stream(&server, &[r#"{"status":"error","error":"syntax error near FROM"}"#]).await;
    let (storage, _dir) = common::create_temp_storage();
    let chat = orchestrator_for(&server, storage.clone());
    chat.refresh_health().await;

    let outcome = chat.submit("broken question").await.unwrap();
    assert_eq!(outcome.terminal, TurnTerminal::Error(TurnErrorKind::Remote));

    let stored = storage.list_messages(&outcome.session_id).unwrap();
    assert_eq!(stored[1].content, "**Error:** syntax error near FROM");
}

#[tokio::test]
async fn test_non_200_query_becomes_error_reply() {
    let server = healthy_server().await;
    Mock::given(method("POST"))
        .and(path("/sql-query"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let (storage, _dir) = common::create_temp_storage();
    let chat = orchestrator_for(&server, storage);
    chat.refresh_health().await;

    let outcome = chat.submit("q").await.unwrap();
    assert_eq!(outcome.terminal, TurnTerminal::Error(TurnErrorKind::Remote));
    assert_eq!(outcome.reply, "**Error:** HTTP 500: boom");
}

#[tokio::test]
async fn test_truncated_stream_is_timeout() {
    let server = healthy_server().await;
    mount_stream(&server, &[r#"{"status":"processing","message":"Working"}"#]).await;
    let (storage, _dir) = common::create_temp_storage();
    let chat = orchestrator_for(&server, storage);
    chat.refresh_health().await;

    let outcome = chat.submit("q").await.unwrap();
    assert_eq!(outcome.terminal, TurnTerminal::Timeout);
    assert_eq!(
        outcome.reply,
        "**Timeout:** The query took too long to respond."
    );
    assert_eq!(chat.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_offline_api_rejects_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let (storage, _dir) = common::create_temp_storage();
    let chat = orchestrator_for(&server, storage.clone());

    assert_eq!(chat.refresh_health().await, HealthStatus::Offline);
    let err = chat.submit("q").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SqlChatError>(),
        Some(SqlChatError::ApiUnavailable(_))
    ));

    let session_id = chat.session().lock().await.session_id().to_string();
    assert!(storage.list_messages(&session_id).unwrap().is_empty());
}

#[tokio::test]
async fn test_turns_follow_session_switches() {
    let server = healthy_server().await;
    mount_stream(&server, &[r#"{"status":"completed","reasoning":"ok"}"#]).await;
    let (storage, _dir) = common::create_temp_storage();
    let chat = orchestrator_for(&server, storage.clone());
    chat.refresh_health().await;

    let first = chat.submit("in first").await.unwrap().session_id;
    let second = chat.session().lock().await.create_session().unwrap();
    let outcome = chat.submit("in second").await.unwrap();

    assert_eq!(outcome.session_id, second);
    assert_ne!(first, second);
    assert_eq!(storage.list_messages(&first).unwrap().len(), 2);
    assert_eq!(storage.list_messages(&second).unwrap()[0].content, "in second");

    // Reopening the store resumes the newest session with its history.
    let reopened = SessionController::initialize(storage, SessionOptions::default()).unwrap();
    assert_eq!(reopened.session_id(), second);
    assert_eq!(reopened.messages().len(), 2);
}

//! ChatClient and ChatSession against a local mock `/chat` endpoint.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{dead_endpoint, spawn_mock_chat, Reply, SESSION_ID};
use tokio::sync::mpsc::unbounded_channel;
use twin_core::chat::ChatSession;
use twin_core::client::{ChatClient, ChatError};
use twin_core::timer::PhaseTimer;
use twin_proto::protocol::{ChatRequest, Role, CHAT_ERROR_REPLY};

fn client(base_url: &str) -> ChatClient {
    ChatClient::new(base_url, Duration::from_secs(5)).unwrap()
}

fn session() -> ChatSession {
    let (tx, _rx) = unbounded_channel();
    ChatSession::new(Duration::from_millis(100), PhaseTimer::forward(tx, |f| f))
}

#[tokio::test]
async fn posts_message_and_parses_reply() {
    let mock = spawn_mock_chat(Reply::Echo).await;
    let resp = client(&mock.base_url)
        .send(&ChatRequest {
            message: "Hello".to_string(),
            session_id: None,
        })
        .await
        .unwrap();

    assert_eq!(resp.response, "echo: Hello");
    assert_eq!(resp.session_id, SESSION_ID);
    assert_eq!(mock.requests()[0].session_id, None);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let mock = spawn_mock_chat(Reply::Status(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let err = client(&mock.base_url)
        .send(&ChatRequest {
            message: "Hello".to_string(),
            session_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Status(s) if s == StatusCode::INTERNAL_SERVER_ERROR));
}

#[tokio::test]
async fn body_without_response_is_a_decode_error() {
    let mock = spawn_mock_chat(Reply::Malformed).await;
    let err = client(&mock.base_url)
        .send(&ChatRequest {
            message: "Hello".to_string(),
            session_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Decode(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let base_url = dead_endpoint().await;
    let err = client(&base_url)
        .send(&ChatRequest {
            message: "Hello".to_string(),
            session_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Transport(_)));
}

#[tokio::test]
async fn session_token_travels_on_follow_ups() {
    let mock = spawn_mock_chat(Reply::Echo).await;
    let client = client(&mock.base_url);
    let mut chat = session();

    chat.set_input("Hello");
    let reply = chat.send_message(&client).await.unwrap();
    assert_eq!(reply.content, "echo: Hello");
    assert_eq!(chat.session_token(), Some(SESSION_ID));

    chat.set_input("Again");
    chat.send_message(&client).await.unwrap();

    let seen = mock.requests();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].session_id, None);
    assert_eq!(seen[1].session_id.as_deref(), Some(SESSION_ID));
    assert_eq!(chat.messages().len(), 4);
}

#[tokio::test]
async fn failed_exchange_keeps_user_message_and_apologises() {
    let mock = spawn_mock_chat(Reply::Status(StatusCode::BAD_GATEWAY)).await;
    let mut chat = session();

    chat.set_input("Hello");
    chat.send_message(&client(&mock.base_url)).await.unwrap();

    let log: Vec<_> = chat
        .messages()
        .iter()
        .map(|m| (m.role, m.content.clone()))
        .collect();
    assert_eq!(
        log,
        vec![
            (Role::User, "Hello".to_string()),
            (Role::Assistant, CHAT_ERROR_REPLY.to_string()),
        ]
    );
    assert_eq!(chat.session_token(), None);
    assert!(!chat.is_in_flight());
}

#[tokio::test]
async fn blank_input_never_reaches_the_endpoint() {
    let mock = spawn_mock_chat(Reply::Echo).await;
    let mut chat = session();
    chat.set_input("   ");
    assert!(chat.send_message(&client(&mock.base_url)).await.is_none());
    assert!(mock.requests().is_empty());
}

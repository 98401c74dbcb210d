#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use twin_proto::protocol::ChatRequest;

/// How the mock `/chat` endpoint answers.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// Echo the message back under a fixed session id.
    Echo,
    Status(StatusCode),
    /// 200 with a body that lacks `response`.
    Malformed,
    /// Echo, but only after a delay.
    Slow(Duration),
}

#[derive(Clone)]
struct MockState {
    reply: Reply,
    seen: Arc<Mutex<Vec<ChatRequest>>>,
}

pub struct MockChat {
    pub base_url: String,
    seen: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockChat {
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

pub const SESSION_ID: &str = "session-abc";

pub async fn spawn_mock_chat(reply: Reply) -> MockChat {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        reply,
        seen: seen.clone(),
    };
    let app = Router::new()
        .route("/chat", post(handle_chat))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockChat {
        base_url: format!("http://{}", addr),
        seen,
    }
}

/// A base URL nothing is listening on.
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn handle_chat(State(state): State<MockState>, Json(req): Json<ChatRequest>) -> Response {
    let message = req.message.clone();
    state.seen.lock().unwrap().push(req);

    match state.reply {
        Reply::Echo => echo(&message),
        Reply::Slow(delay) => {
            tokio::time::sleep(delay).await;
            echo(&message)
        }
        Reply::Status(status) => (status, "backend down").into_response(),
        Reply::Malformed => Json(serde_json::json!({ "detail": "no response here" })).into_response(),
    }
}

fn echo(message: &str) -> Response {
    Json(serde_json::json!({
        "response": format!("echo: {}", message),
        "session_id": SESSION_ID,
    }))
    .into_response()
}

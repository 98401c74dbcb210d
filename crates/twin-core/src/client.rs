use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;
use twin_proto::protocol::{ChatRequest, ChatResponse};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("chat endpoint returned {0}")]
    Status(StatusCode),
    #[error("malformed chat reply: {0}")]
    Decode(#[source] reqwest::Error),
}

/// HTTP client for the chat backend.  Cheap to clone.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    url: String,
}

impl ChatClient {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: format!("{}/chat", endpoint.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One POST per call.  Non-2xx statuses and bodies without a `response`
    /// field are errors.
    pub async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        debug!("chat: POST {} (session={:?})", self.url, request.session_id);
        let resp = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(ChatError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChatError::Status(status));
        }
        resp.json::<ChatResponse>().await.map_err(ChatError::Decode)
    }
}

//! ChatSession: the conversation log and one request in flight at a time.
//!
//! A send is split in two so the core loop never awaits the network:
//! `begin_send()` commits the user's message and yields the request, and
//! `complete()` applies whatever came back.  Nothing is ever rolled back;
//! a failed exchange leaves the user message plus a fixed apology.

use std::time::Duration;

use tracing::{debug, warn};
use twin_proto::protocol::{ChatRequest, ChatResponse, Message, CHAT_ERROR_REPLY};

use crate::client::{ChatClient, ChatError};
use crate::timer::{PhaseTimer, TimerFired};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatTimer {
    Refocus,
}

pub struct ChatSession {
    messages: Vec<Message>,
    input: String,
    /// Adopted from the first successful reply, then kept for the session.
    session_token: Option<String>,
    in_flight: bool,
    refocus_delay: Duration,
    timer: PhaseTimer<ChatTimer>,
}

impl ChatSession {
    pub fn new(refocus_delay: Duration, timer: PhaseTimer<ChatTimer>) -> Self {
        Self {
            messages: Vec::new(),
            input: String::new(),
            session_token: None,
            in_flight: false,
            refocus_delay,
            timer,
        }
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Commit the typed input as a user message and build the request.
    /// `None` for blank input or while a previous request is outstanding.
    pub fn begin_send(&mut self) -> Option<ChatRequest> {
        if self.in_flight || self.input.trim().is_empty() {
            return None;
        }

        let content = std::mem::take(&mut self.input);
        self.messages.push(Message::user(content.clone()));
        self.in_flight = true;
        debug!("chat: sending message #{}", self.messages.len());

        Some(ChatRequest {
            message: content,
            session_id: self.session_token.clone(),
        })
    }

    /// Apply the outcome of the outstanding request and return the
    /// assistant message it produced.
    pub fn complete(&mut self, outcome: Result<ChatResponse, ChatError>) -> &Message {
        let reply = match outcome {
            Ok(resp) => {
                if self.session_token.is_none() {
                    debug!("chat: session {}", resp.session_id);
                    self.session_token = Some(resp.session_id);
                }
                Message::assistant(resp.response)
            }
            Err(e) => {
                warn!("chat: {}", e);
                Message::assistant(CHAT_ERROR_REPLY)
            }
        };

        self.in_flight = false;
        self.timer.schedule(ChatTimer::Refocus, self.refocus_delay);
        self.messages.push(reply);
        &self.messages[self.messages.len() - 1]
    }

    /// True when the input should take focus again.
    pub fn on_timer(&mut self, fired: TimerFired<ChatTimer>) -> bool {
        self.timer.accept(fired).is_some()
    }

    /// Whole exchange in one call, for callers that can afford to await it.
    pub async fn send_message(&mut self, client: &ChatClient) -> Option<&Message> {
        let request = self.begin_send()?;
        let outcome = client.send(&request).await;
        Some(self.complete(outcome))
    }

    pub fn teardown(&mut self) {
        self.timer.cancel_all();
    }
}

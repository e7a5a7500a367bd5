//! Chat model abstraction shared by the classifier and the responder.

use crate::error::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling options forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub temperature: f32,
    /// Maximum number of tokens to generate.
    pub num_predict: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
}

/// A generative text model that answers one chat request at a time.
///
/// Calls block until the model answers or its timeout expires.
pub trait ChatModel: Send + Sync {
    /// Return the assistant message content for `request`.
    fn chat(&self, request: &ChatRequest) -> Result<String>;

    /// Cheap liveness probe, for health reporting only.
    fn is_connected(&self) -> bool;
}

impl<T: ChatModel + ?Sized> ChatModel for std::sync::Arc<T> {
    fn chat(&self, request: &ChatRequest) -> Result<String> {
        (**self).chat(request)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Scripted chat model for tests.
///
/// Replays queued replies in order, then falls back to the default reply.
/// Every request is recorded.
#[derive(Debug)]
pub struct MockChatModel {
    replies: Mutex<VecDeque<Result<String>>>,
    default_reply: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
    connected: bool,
}

impl MockChatModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: None,
            requests: Mutex::new(Vec::new()),
            connected: true,
        }
    }

    /// Queue one successful reply.
    pub fn with_reply(self, reply: &str) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Ok(reply.to_string()));
        }
        self
    }

    /// Queue one failure.
    pub fn with_error(self, message: &str) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(VoiceError::ChatModel {
                message: message.to_string(),
            }));
        }
        self
    }

    /// Reply used once the queue is exhausted.
    pub fn with_default_reply(mut self, reply: &str) -> Self {
        self.default_reply = Some(reply.to_string());
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatModel for MockChatModel {
    fn chat(&self, request: &ChatRequest) -> Result<String> {
        self.requests
            .lock()
            .map_err(|e| VoiceError::Other(format!("mock lock poisoned: {e}")))?
            .push(request.clone());

        let queued = self
            .replies
            .lock()
            .map_err(|e| VoiceError::Other(format!("mock lock poisoned: {e}")))?
            .pop_front();

        match (queued, &self.default_reply) {
            (Some(reply), _) => reply,
            (None, Some(reply)) => Ok(reply.clone()),
            (None, None) => Err(VoiceError::ChatModel {
                message: "no scripted reply left".to_string(),
            }),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

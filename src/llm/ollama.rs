//! Ollama HTTP client.
//!
//! `POST {host}/api/chat` with streaming disabled; `GET {host}/api/tags`
//! as a liveness probe. A fresh reqwest client is built per call so it is
//! always bound to the runtime that drives it.

use crate::bridge;
use crate::config::LlmConfig;
use crate::error::{Result, VoiceError};
use crate::llm::chat::{ChatMessage, ChatModel, ChatOptions, ChatRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bound on the liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaReply>,
}

#[derive(Deserialize)]
struct OllamaReply {
    content: String,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(host: &str, model: &str, timeout: Duration) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            &config.host,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn http_client(timeout: Duration) -> Result<Client> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::ChatModel {
                message: format!("failed to build HTTP client: {e}"),
            })
    }

    async fn chat_async(&self, request: &ChatRequest) -> Result<String> {
        let client = Self::http_client(self.timeout)?;
        let body = OllamaChatRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
            options: request.options,
        };

        let response = client
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::ChatModel {
                message: if e.is_timeout() {
                    format!("timed out after {:?}", self.timeout)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| VoiceError::ChatModel {
            message: format!("failed to read response: {e}"),
        })?;

        if !status.is_success() {
            return Err(VoiceError::ChatModel {
                message: format!("HTTP {}: {}", status, body_text),
            });
        }

        let parsed: OllamaChatResponse =
            serde_json::from_str(&body_text).map_err(|e| VoiceError::ChatModel {
                message: format!("unexpected response body: {e}"),
            })?;

        parsed
            .message
            .map(|m| m.content.trim().to_string())
            .ok_or_else(|| VoiceError::ChatModel {
                message: "response had no message".to_string(),
            })
    }

    async fn probe(&self) -> bool {
        let Ok(client) = Self::http_client(PROBE_TIMEOUT) else {
            return false;
        };
        match client.get(format!("{}/api/tags", self.host)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("ollama probe failed: {e}");
                false
            }
        }
    }
}

impl ChatModel for OllamaClient {
    fn chat(&self, request: &ChatRequest) -> Result<String> {
        tracing::debug!(model = %self.model, messages = request.messages.len(), "ollama chat");
        bridge::block_on(self.chat_async(request))?
    }

    fn is_connected(&self) -> bool {
        bridge::block_on(self.probe()).unwrap_or(false)
    }
}

//! Speech synthesis engines.

use crate::config::TtsConfig;
use crate::error::{Result, VoiceError};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Turns text into an audio file.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Synthesize `text` with `voice` and write the audio to `output`.
    ///
    /// On error the output path may hold a partial file; the caller removes it.
    async fn synthesize_to_file(&self, text: &str, voice: &str, output: &Path) -> Result<()>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Client for an OpenAI-compatible `/v1/audio/speech` endpoint.
///
/// An edge-tts bridge exposing this API gives the Korean neural voices.
#[derive(Debug, Clone)]
pub struct HttpSpeechEngine {
    endpoint: String,
    format: String,
    timeout: Duration,
}

impl HttpSpeechEngine {
    pub fn new(endpoint: &str, format: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            format: format.to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &TtsConfig) -> Self {
        Self::new(
            &config.endpoint,
            &config.format,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn synthesis_error(message: impl Into<String>) -> VoiceError {
    VoiceError::Synthesis {
        message: message.into(),
    }
}

#[async_trait]
impl SpeechEngine for HttpSpeechEngine {
    async fn synthesize_to_file(&self, text: &str, voice: &str, output: &Path) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| synthesis_error(format!("failed to build HTTP client: {e}")))?;

        let body = SpeechRequest {
            model: "tts-1",
            input: text,
            voice,
            response_format: &self.format,
        };

        let response = client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| synthesis_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(synthesis_error(format!(
                "HTTP {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| synthesis_error(format!("failed to read audio: {e}")))?;
        if audio.is_empty() {
            return Err(synthesis_error("engine returned no audio"));
        }

        tokio::fs::write(output, &audio).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Scripted engine for tests.
#[derive(Debug)]
pub struct MockSpeechEngine {
    audio: Vec<u8>,
    failure: Option<String>,
    write_before_failing: bool,
    calls: AtomicUsize,
}

impl MockSpeechEngine {
    /// Engine that writes a few fake MP3 bytes.
    pub fn new() -> Self {
        Self {
            audio: b"ID3\x03\x00fake-mp3".to_vec(),
            failure: None,
            write_before_failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Leave a partial file behind before failing.
    pub fn with_partial_write(mut self) -> Self {
        self.write_before_failing = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSpeechEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechEngine for MockSpeechEngine {
    async fn synthesize_to_file(&self, _text: &str, _voice: &str, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        match &self.failure {
            Some(message) => {
                if self.write_before_failing {
                    tokio::fs::write(output, &self.audio[..self.audio.len() / 2]).await?;
                }
                Err(synthesis_error(message.clone()))
            }
            None => {
                tokio::fs::write(output, &self.audio).await?;
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

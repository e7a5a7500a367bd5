use crate::error::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Speech recognition output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Trimmed text; empty for silence.
    pub text: String,
    /// Language tag reported by the model.
    pub language: String,
    /// In [0, 1], rounded to 2 decimals.
    pub confidence: f32,
}

impl Transcript {
    pub fn is_silent(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Shared flag asking a running transcription to stop.
///
/// Clones observe the same flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait Transcriber: Send + Sync {
    /// Transcribe audio samples to text.
    ///
    /// # Arguments
    /// * `audio` - Audio samples as 16-bit PCM at 16kHz mono
    /// * `cancel` - Checked during inference; once set, the call should stop
    ///   early and return `TranscriptionFailed`
    fn transcribe(&self, audio: &[i16], cancel: &CancelToken) -> Result<Transcript>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;
}

/// Implement Transcriber for Arc<T> to allow sharing across requests.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &[i16], cancel: &CancelToken) -> Result<Transcript> {
        (**self).transcribe(audio, cancel)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Round a probability-like value to 2 decimals within [0, 1].
pub fn round_confidence(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Mock transcriber for testing
#[derive(Debug)]
pub struct MockTranscriber {
    model_name: String,
    response: Transcript,
    should_fail: bool,
    calls: AtomicUsize,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: Transcript {
                text: "mock transcription".to_string(),
                language: "ko".to_string(),
                confidence: 0.9,
            },
            should_fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Configure the mock to return a specific text
    pub fn with_response(mut self, text: &str) -> Self {
        self.response.text = text.to_string();
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.response.language = language.to_string();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.response.confidence = confidence;
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _audio: &[i16], _cancel: &CancelToken) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            Err(VoiceError::TranscriptionFailed {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

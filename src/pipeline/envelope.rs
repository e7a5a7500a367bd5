//! Response envelopes and the error codes reported to callers.
//!
//! Every analysis ends in exactly one of two JSON shapes:
//!
//! ```json
//! {"success": true, "data": {...}, "processing_time": 1.23}
//! {"success": false, "error": {"code": "INVALID_AUDIO", "message": "...", "details": "..."}}
//! ```

use crate::error::VoiceError;
use crate::llm::{ConversationState, Emotion};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User-facing message shared by every internal (500) failure.
pub const INTERNAL_MESSAGE: &str = "음성 인식에 실패했습니다. 다시 시도해주세요.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidAudio,
    ConversionFailed,
    WhisperFailed,
    ParseError,
}

impl ErrorCode {
    /// HTTP status the serving layer answers with.
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::InvalidAudio => 400,
            _ => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidAudio => "INVALID_AUDIO",
            ErrorCode::ConversionFailed => "CONVERSION_FAILED",
            ErrorCode::WhisperFailed => "WHISPER_FAILED",
            ErrorCode::ParseError => "PARSE_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed analysis, ready to be serialized into the error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AnalyzeError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AnalyzeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn missing_audio() -> Self {
        Self::new(ErrorCode::InvalidAudio, "오디오 파일이 없습니다.")
    }

    pub fn empty_audio() -> Self {
        Self::new(ErrorCode::InvalidAudio, "오디오 파일이 비어 있습니다.")
    }

    pub fn oversize(max_bytes: u64) -> Self {
        Self::new(
            ErrorCode::InvalidAudio,
            format!("오디오 파일이 너무 큽니다. (최대 {}MB)", megabytes(max_bytes)),
        )
    }

    /// Unclassified internal failure (I/O, panic).
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, INTERNAL_MESSAGE).with_details(details)
    }

    pub fn status(&self) -> u16 {
        self.code.status()
    }
}

/// Widen a 2-decimal `f32` score without exposing its binary expansion.
pub fn score(value: f32) -> f64 {
    (f64::from(value) * 100.0).round() / 100.0
}

/// Render a byte limit in whole MiB, or one decimal when it is not whole.
fn megabytes(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes % MIB == 0 {
        (bytes / MIB).to_string()
    } else {
        format!("{:.1}", bytes as f64 / MIB as f64)
    }
}

impl From<&VoiceError> for AnalyzeError {
    fn from(err: &VoiceError) -> Self {
        let code = match err {
            VoiceError::InvalidAudio { message } => {
                return Self::new(ErrorCode::InvalidAudio, message.clone());
            }
            VoiceError::ConversionFailed { .. } | VoiceError::ConversionToolNotFound { .. } => {
                ErrorCode::ConversionFailed
            }
            VoiceError::TranscriptionModelNotFound { .. }
            | VoiceError::TranscriptionFailed { .. } => ErrorCode::WhisperFailed,
            other if other.to_string().to_lowercase().contains("whisper") => {
                ErrorCode::WhisperFailed
            }
            _ => ErrorCode::ParseError,
        };
        Self::new(code, INTERNAL_MESSAGE).with_details(err.to_string())
    }
}

impl From<VoiceError> for AnalyzeError {
    fn from(err: VoiceError) -> Self {
        Self::from(&err)
    }
}

/// Payload of a successful analysis. Every field is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    pub text: String,
    pub response_text: String,
    /// `/api/audio/<file>` or empty when no audio was produced.
    pub audio_url: String,
    pub emotion: Emotion,
    pub intensity: f64,
    pub state: ConversationState,
    pub keywords: Vec<String>,
    pub confidence: f64,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub data: AnalysisData,
    /// Wall-clock seconds, rounded to 2 decimals.
    pub processing_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope {
    pub success: bool,
    pub data: AnalysisData,
    pub processing_time: f64,
}

impl From<AnalysisResult> for SuccessEnvelope {
    fn from(result: AnalysisResult) -> Self {
        Self {
            success: true,
            data: result.data,
            processing_time: result.processing_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: AnalyzeError,
}

impl From<AnalyzeError> for ErrorEnvelope {
    fn from(error: AnalyzeError) -> Self {
        Self {
            success: false,
            error,
        }
    }
}

/// Serialize the outcome of an analysis into its envelope and HTTP status.
pub fn to_envelope(
    outcome: Result<AnalysisResult, AnalyzeError>,
) -> (u16, serde_json::Value) {
    let serialized = match outcome {
        Ok(result) => serde_json::to_value(SuccessEnvelope::from(result)).map(|v| (200, v)),
        Err(err) => {
            let status = err.status();
            serde_json::to_value(ErrorEnvelope::from(err)).map(|v| (status, v))
        }
    };
    serialized.unwrap_or_else(|e| {
        let fallback = AnalyzeError::internal(format!("failed to serialize response: {e}"));
        (
            fallback.status(),
            serde_json::json!({
                "success": false,
                "error": {
                    "code": fallback.code.as_str(),
                    "message": fallback.message,
                    "details": fallback.details,
                }
            }),
        )
    })
}

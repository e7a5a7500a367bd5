//! Error types for mindvoice.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Input validation
    #[error("Invalid audio: {message}")]
    InvalidAudio { message: String },

    // Transcoding errors
    #[error("Audio conversion failed: {message}")]
    ConversionFailed { message: String },

    #[error("Conversion tool not found: {tool}")]
    ConversionToolNotFound { tool: String },

    // Transcription errors
    #[error("Whisper model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Whisper transcription failed: {message}")]
    TranscriptionFailed { message: String },

    // Generative model errors (never surfaced past the classifier/responder)
    #[error("Chat model request failed: {message}")]
    ChatModel { message: String },

    // Speech synthesis errors (never surfaced past the synthesizer)
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Async bridge errors
    #[error("Runtime error: {message}")]
    Runtime { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoiceError>;

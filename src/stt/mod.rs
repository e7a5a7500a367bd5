//! Speech-to-text: normalized waveform in, transcript out.

pub mod recognizer;
pub mod transcriber;
pub mod whisper;

pub use recognizer::{SpeechRecognizer, TranscriberLoader};
pub use transcriber::{CancelToken, MockTranscriber, Transcriber, Transcript};
pub use whisper::{WhisperConfig, WhisperTranscriber};

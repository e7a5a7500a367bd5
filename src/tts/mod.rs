//! Speech synthesis of the generated reply.

pub mod engine;
pub mod synthesizer;

pub use engine::{HttpSpeechEngine, MockSpeechEngine, SpeechEngine};
pub use synthesizer::Synthesizer;

//! Generative text model stages: emotion classification and reply generation.

pub mod chat;
pub mod emotion;
pub mod ollama;
pub mod responder;

pub use chat::{ChatMessage, ChatModel, ChatOptions, ChatRequest, MockChatModel, Role};
pub use emotion::{ConversationState, Emotion, EmotionClassifier, EmotionResult};
pub use ollama::OllamaClient;
pub use responder::{FALLBACK_REPLY, Responder};

//! Short empathetic replies in Korean.

use crate::llm::chat::{ChatMessage, ChatModel, ChatOptions, ChatRequest};
use crate::llm::emotion::Emotion;
use std::sync::Arc;

/// Returned whenever the model cannot produce a reply.
pub const FALLBACK_REPLY: &str = "죄송해요, 지금은 대답하기 어렵네요.";

pub const RESPOND_OPTIONS: ChatOptions = ChatOptions {
    temperature: 0.7,
    num_predict: 100,
};

const PERSONA: &str = "당신은 'MindCare'라는 이름의 공감형 AI 비서입니다. \
사용자의 감정과 맥락을 고려하여 짧고 명확하게, 그리고 따뜻하게 대답하세요. \
한국어로 자연스럽게 대화하세요. 2~3문장 이내로 답변하세요.";

/// System instruction for a user currently feeling `emotion`.
pub fn system_prompt(emotion: Emotion) -> String {
    format!("{PERSONA}\n사용자의 현재 감정: {emotion}")
}

pub struct Responder {
    model: Arc<dyn ChatModel>,
}

impl Responder {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Generate a reply. Single attempt; never fails.
    pub fn respond(&self, text: &str, emotion: Emotion) -> String {
        if text.is_empty() {
            return String::new();
        }

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(system_prompt(emotion)),
                ChatMessage::user(text),
            ],
            options: RESPOND_OPTIONS,
        };

        match self.model.chat(&request) {
            Ok(reply) if !reply.trim().is_empty() => {
                let reply = reply.trim().to_string();
                tracing::info!(reply = %reply, "reply generated");
                reply
            }
            Ok(_) => {
                tracing::warn!("model returned an empty reply");
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                tracing::error!("reply generation failed: {e}");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

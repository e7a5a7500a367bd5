//! Emotion classification through a chat model with a strict JSON contract.
//!
//! The model is asked for a single flat JSON object. Its output is treated
//! as untrusted: the first brace-delimited object is extracted and every
//! field is normalized on its own, so a partly compliant answer still keeps
//! its usable parts. Classification never fails; the worst case is the
//! default result.

use crate::llm::chat::{ChatMessage, ChatModel, ChatOptions, ChatRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Emotion labels the classifier may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    #[default]
    Neutral,
    Excited,
    Thinking,
    Calm,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Neutral,
        Emotion::Excited,
        Emotion::Thinking,
        Emotion::Calm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Neutral => "neutral",
            Emotion::Excited => "excited",
            Emotion::Thinking => "thinking",
            Emotion::Calm => "calm",
        }
    }

    /// Exact, case-sensitive label lookup.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == label)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversational state hint for the client avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    Listening,
    Thinking,
    #[default]
    Speaking,
}

impl ConversationState {
    pub const ALL: [ConversationState; 3] = [
        ConversationState::Listening,
        ConversationState::Thinking,
        ConversationState::Speaking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::Listening => "listening",
            ConversationState::Thinking => "thinking",
            ConversationState::Speaking => "speaking",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum number of keywords kept from the model output.
pub const MAX_KEYWORDS: usize = 5;

const DEFAULT_INTENSITY: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    pub emotion: Emotion,
    /// In [0, 1], rounded to 2 decimals.
    pub intensity: f32,
    pub state: ConversationState,
    /// At most `MAX_KEYWORDS` entries.
    pub keywords: Vec<String>,
}

impl Default for EmotionResult {
    fn default() -> Self {
        Self {
            emotion: Emotion::Neutral,
            intensity: DEFAULT_INTENSITY,
            state: ConversationState::Speaking,
            keywords: Vec::new(),
        }
    }
}

const EMOTION_PROMPT: &str = r#"당신은 전문 감정 분석 AI입니다.
사용자의 발화를 분석하여 감정 상태를 JSON 형식으로 출력하세요.

**감정 카테고리:**
- happy: 행복, 기쁨, 만족
- sad: 슬픔, 우울, 상실감
- angry: 분노, 짜증, 화남
- neutral: 중립적, 평범함
- excited: 흥분, 열정, 들뜸
- thinking: 고민, 사색, 집중
- calm: 평온, 안정, 차분함

**출력 형식 (JSON만 출력, 다른 텍스트 금지):**
{"emotion": "감정 카테고리", "intensity": 0.0~1.0, "state": "listening|thinking|speaking", "keywords": ["핵심", "단어", "목록"]}

**예시:**
입력: "오늘 정말 짜증나"
출력: {"emotion": "angry", "intensity": 0.8, "state": "speaking", "keywords": ["오늘", "짜증"]}

입력: "AGI 구현 방법을 고민 중이야"
출력: {"emotion": "thinking", "intensity": 0.7, "state": "thinking", "keywords": ["AGI", "구현", "고민"]}

입력: "와 드디어 됐다!"
출력: {"emotion": "excited", "intensity": 0.95, "state": "speaking", "keywords": ["드디어"]}

**이제 분석할 텍스트:**
{user_text}

**출력 (JSON만):**"#;

/// Low temperature: the answer should be a deterministic label, not prose.
pub const CLASSIFY_OPTIONS: ChatOptions = ChatOptions {
    temperature: 0.1,
    num_predict: 200,
};

/// Build the classification prompt for `text`.
pub fn build_prompt(text: &str) -> String {
    EMOTION_PROMPT.replace("{user_text}", text)
}

const FLAT_OBJECT_PATTERN: &str = r"\{[^{}]*\}";

// SAFETY: hardcoded pattern, compiled in a unit test
#[allow(clippy::expect_used)]
static FLAT_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(FLAT_OBJECT_PATTERN).expect("hardcoded flat object pattern"));

/// Extract the first flat JSON object from free-form model output.
///
/// Only objects without nested braces are recognized and the first match
/// wins, even if a later one would parse. Returns `None` when there is no
/// match or the match is not a valid JSON object.
pub fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let candidate = FLAT_OBJECT.find(raw)?.as_str();
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(
                "classifier JSON decode failed ({e}): {}",
                candidate.chars().take(100).collect::<String>()
            );
            None
        }
    }
}

fn normalize_intensity(value: Option<&Value>) -> f32 {
    let raw = value.and_then(Value::as_f64).unwrap_or(DEFAULT_INTENSITY as f64);
    let clamped = if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        DEFAULT_INTENSITY as f64
    };
    ((clamped * 100.0).round() / 100.0) as f32
}

fn normalize_keywords(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .take(MAX_KEYWORDS)
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
        .collect()
}

/// Normalize an extracted object field by field.
pub fn normalize_fields(data: &Map<String, Value>) -> EmotionResult {
    let emotion = data
        .get("emotion")
        .and_then(Value::as_str)
        .and_then(Emotion::from_label)
        .unwrap_or_default();

    let state = data
        .get("state")
        .and_then(Value::as_str)
        .and_then(ConversationState::from_label)
        .unwrap_or_default();

    EmotionResult {
        emotion,
        intensity: normalize_intensity(data.get("intensity")),
        state,
        keywords: normalize_keywords(data.get("keywords")),
    }
}

/// Turn raw model output into a valid `EmotionResult`.
///
/// Pure: the same input always yields the same result.
pub fn parse_response(raw: &str) -> EmotionResult {
    match extract_json_object(raw) {
        Some(data) => normalize_fields(&data),
        None => {
            tracing::warn!(
                "no usable JSON in classifier output, using default: {}",
                raw.chars().take(100).collect::<String>()
            );
            EmotionResult::default()
        }
    }
}

pub struct EmotionClassifier {
    model: Arc<dyn ChatModel>,
}

impl EmotionClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Classify `text`. Never fails.
    pub fn classify(&self, text: &str) -> EmotionResult {
        if text.trim().is_empty() {
            return EmotionResult::default();
        }

        let request = ChatRequest {
            messages: vec![ChatMessage::user(build_prompt(text))],
            options: CLASSIFY_OPTIONS,
        };

        match self.model.chat(&request) {
            Ok(raw) => {
                tracing::debug!(raw = %raw, "classifier output");
                parse_response(raw.trim())
            }
            Err(e) => {
                tracing::error!("emotion classification failed: {e}");
                EmotionResult::default()
            }
        }
    }
}

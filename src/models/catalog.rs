//! Whisper model metadata catalog.
//!
//! Only multilingual ggml models are listed: the English-only `.en`
//! variants cannot transcribe Korean.

const BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Metadata for a Whisper model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// Model identifier (e.g., "tiny", "small", "large-v3")
    pub name: &'static str,
    /// Approximate model size in megabytes
    pub size_mb: u32,
    /// Short note shown by `models list`
    pub note: &'static str,
}

impl ModelInfo {
    /// File name of the ggml weights.
    pub fn filename(&self) -> String {
        format!("ggml-{}.bin", self.name)
    }

    /// Download URL on HuggingFace.
    pub fn url(&self) -> String {
        format!("{}/{}", BASE_URL, self.filename())
    }
}

/// Catalog of available Whisper models, smallest first.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "tiny",
        size_mb: 75,
        note: "fastest, poor Korean accuracy",
    },
    ModelInfo {
        name: "base",
        size_mb: 142,
        note: "fast, usable for short phrases",
    },
    ModelInfo {
        name: "small",
        size_mb: 466,
        note: "recommended",
    },
    ModelInfo {
        name: "medium",
        size_mb: 1533,
        note: "better accuracy, needs a fast CPU or GPU",
    },
    ModelInfo {
        name: "large-v3-turbo",
        size_mb: 1624,
        note: "near large-v3 accuracy, much faster",
    },
    ModelInfo {
        name: "large-v3",
        size_mb: 3095,
        note: "best accuracy, GPU recommended",
    },
];

/// Map short aliases to catalog names.
///
/// Unknown names pass through unchanged.
pub fn resolve_name(name: &str) -> &str {
    match name {
        "large" => "large-v3",
        "turbo" | "large-turbo" => "large-v3-turbo",
        other => other,
    }
}

/// Find a model by name or alias.
pub fn get_model(name: &str) -> Option<&'static ModelInfo> {
    let resolved = resolve_name(name);
    MODELS.iter().find(|m| m.name == resolved)
}

/// Get all available models.
pub fn list_models() -> &'static [ModelInfo] {
    MODELS
}

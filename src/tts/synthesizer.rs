//! Reply text to a served audio artifact.
//!
//! Synthesized files are named `tts_<8 hex>.<format>` and live in the shared
//! artifact directory. The pipeline never deletes them; the client fetches
//! them later through the audio route.

use crate::bridge;
use crate::config::TtsConfig;
use crate::defaults::TTS_PREFIX;
use crate::tts::engine::SpeechEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

pub struct Synthesizer {
    engine: Arc<dyn SpeechEngine>,
    artifact_dir: PathBuf,
    voice: String,
    format: String,
}

impl Synthesizer {
    pub fn new(engine: Arc<dyn SpeechEngine>, artifact_dir: &Path, config: &TtsConfig) -> Self {
        Self {
            engine,
            artifact_dir: artifact_dir.to_path_buf(),
            voice: config.voice.clone(),
            format: config.format.clone(),
        }
    }

    fn artifact_name(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("{}{}.{}", TTS_PREFIX, &id[..8], self.format)
    }

    /// Synthesize `text` and return the artifact file name.
    ///
    /// `None` means no audio was produced, whether the text was blank or the
    /// engine failed. Blocks until the engine finishes.
    pub fn synthesize(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }

        let filename = self.artifact_name();
        let output = self.artifact_dir.join(&filename);

        let outcome = bridge::block_on(self.engine.synthesize_to_file(text, &self.voice, &output))
            .and_then(|inner| inner);

        match outcome {
            Ok(()) => {
                tracing::info!(file = %filename, engine = self.engine.name(), "speech synthesized");
                Some(filename)
            }
            Err(e) => {
                tracing::error!("speech synthesis failed: {e}");
                match std::fs::remove_file(&output) {
                    Ok(()) => tracing::debug!(file = %filename, "removed partial artifact"),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => tracing::warn!(file = %filename, "failed to remove partial artifact: {err}"),
                }
                None
            }
        }
    }
}

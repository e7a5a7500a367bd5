//! Per-request sequencing of the analysis stages.

use super::envelope::{AnalysisData, AnalysisResult, AnalyzeError, score};
use super::types::{AudioBlob, Stage};
use crate::artifact::TempArtifact;
use crate::audio::{Transcoder, WaveformConverter};
use crate::config::Config;
use crate::defaults::AUDIO_URL_PREFIX;
use crate::error::VoiceError;
use crate::llm::{
    ChatModel, ConversationState, Emotion, EmotionClassifier, EmotionResult, OllamaClient,
    Responder,
};
use crate::stt::{SpeechRecognizer, Transcript};
use crate::tts::{HttpSpeechEngine, SpeechEngine, Synthesizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// The voice analysis pipeline.
///
/// Stages run strictly in order on the calling thread:
/// transcode → transcribe → classify → respond → synthesize.
/// The upload and its waveform live only for the duration of one
/// [`Pipeline::analyze`] call; synthesized replies stay in the upload
/// directory to be served later.
pub struct Pipeline {
    upload_dir: PathBuf,
    max_upload_bytes: u64,
    language: String,
    converter: Arc<dyn WaveformConverter>,
    recognizer: Arc<SpeechRecognizer>,
    chat: Arc<dyn ChatModel>,
    classifier: EmotionClassifier,
    responder: Responder,
    synthesizer: Synthesizer,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        converter: Arc<dyn WaveformConverter>,
        recognizer: Arc<SpeechRecognizer>,
        chat: Arc<dyn ChatModel>,
        speech: Arc<dyn SpeechEngine>,
    ) -> Self {
        Self {
            upload_dir: config.audio.upload_dir.clone(),
            max_upload_bytes: config.audio.max_upload_bytes,
            language: config.stt.language.clone(),
            converter,
            recognizer,
            classifier: EmotionClassifier::new(chat.clone()),
            responder: Responder::new(chat.clone()),
            chat,
            synthesizer: Synthesizer::new(speech, &config.audio.upload_dir, &config.tts),
        }
    }

    /// Wire the production stages: ffmpeg with the in-process fallback,
    /// whisper, Ollama and the HTTP speech engine.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(Transcoder::from_config(&config.audio)),
            Arc::new(SpeechRecognizer::from_config(&config.stt)),
            Arc::new(OllamaClient::from_config(&config.llm)),
            Arc::new(HttpSpeechEngine::from_config(&config.tts)),
        )
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn recognizer(&self) -> &SpeechRecognizer {
        &self.recognizer
    }

    pub fn whisper_loaded(&self) -> bool {
        self.recognizer.is_loaded()
    }

    /// Probes the chat model; blocks for up to a couple of seconds.
    pub fn chat_connected(&self) -> bool {
        self.chat.is_connected()
    }

    /// Reject a blob before anything touches disk.
    pub fn validate(&self, blob: &AudioBlob) -> Result<(), AnalyzeError> {
        if blob.is_empty() {
            return Err(AnalyzeError::empty_audio());
        }
        if blob.effective_size() > self.max_upload_bytes {
            return Err(AnalyzeError::oversize(self.max_upload_bytes));
        }
        Ok(())
    }

    /// Run the whole pipeline on one upload.
    pub fn analyze(&self, blob: AudioBlob) -> Result<AnalysisResult, AnalyzeError> {
        let started = Instant::now();

        tracing::debug!(stage = %Stage::Validate, bytes = blob.len());
        self.validate(&blob).inspect_err(|e| {
            tracing::warn!(stage = %Stage::Validate, "rejected upload: {}", e.message)
        })?;

        let transcript = self.transcribe_upload(blob)?;

        let data = if transcript.is_silent() {
            tracing::info!("empty transcript, skipping classification and reply");
            self.silent_result()
        } else {
            self.respond_to(transcript)
        };

        let elapsed = started.elapsed().as_secs_f64();
        let processing_time = (elapsed * 100.0).round() / 100.0;
        tracing::info!(
            emotion = %data.emotion,
            state = %data.state,
            seconds = processing_time,
            "analysis complete"
        );

        Ok(AnalysisResult {
            data,
            processing_time,
        })
    }

    /// Persist, transcode and transcribe. Both temp files are gone on return.
    fn transcribe_upload(&self, blob: AudioBlob) -> Result<Transcript, AnalyzeError> {
        tracing::debug!(stage = %Stage::Persist, dir = %self.upload_dir.display());
        std::fs::create_dir_all(&self.upload_dir)
            .map_err(|e| fail(Stage::Persist, VoiceError::Io(e)))?;
        let upload = TempArtifact::reserve(&self.upload_dir, "webm");
        upload
            .write(blob.bytes())
            .map_err(|e| fail(Stage::Persist, e))?;
        drop(blob);

        let waveform = upload.sibling("wav");

        tracing::info!(stage = %Stage::Transcode, converter = self.converter.name());
        self.converter
            .to_waveform(upload.path(), waveform.path())
            .map_err(|e| fail(Stage::Transcode, e))?;

        tracing::info!(stage = %Stage::Transcribe);
        let transcript = self
            .recognizer
            .transcribe(waveform.path())
            .map_err(|e| fail(Stage::Transcribe, e))?;
        tracing::debug!(
            text = %transcript.text,
            language = %transcript.language,
            confidence = transcript.confidence,
            "transcribed"
        );

        Ok(transcript)
    }

    fn respond_to(&self, transcript: Transcript) -> AnalysisData {
        tracing::info!(stage = %Stage::Classify);
        let EmotionResult {
            emotion,
            intensity,
            state,
            keywords,
        } = self.classifier.classify(&transcript.text);

        tracing::info!(stage = %Stage::Respond, %emotion);
        let response_text = self.responder.respond(&transcript.text, emotion);

        tracing::info!(stage = %Stage::Synthesize);
        let audio_url = self
            .synthesizer
            .synthesize(&response_text)
            .map(|file| format!("{AUDIO_URL_PREFIX}{file}"))
            .unwrap_or_default();

        AnalysisData {
            text: transcript.text,
            response_text,
            audio_url,
            emotion,
            intensity: score(intensity),
            state,
            keywords,
            confidence: score(transcript.confidence),
            language: transcript.language,
        }
    }

    fn silent_result(&self) -> AnalysisData {
        AnalysisData {
            text: String::new(),
            response_text: String::new(),
            audio_url: String::new(),
            emotion: Emotion::Neutral,
            intensity: 0.0,
            state: ConversationState::Listening,
            keywords: Vec::new(),
            confidence: 0.0,
            language: self.language.clone(),
        }
    }
}

fn fail(stage: Stage, err: VoiceError) -> AnalyzeError {
    tracing::error!(%stage, "{err}");
    AnalyzeError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::files_with_prefix;
    use crate::audio::MockWaveformConverter;
    use crate::llm::MockChatModel;
    use crate::pipeline::ErrorCode;
    use crate::stt::MockTranscriber;
    use crate::tts::MockSpeechEngine;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        upload_dir: PathBuf,
        pipeline: Pipeline,
        converter: Arc<MockWaveformConverter>,
        transcriber: Arc<MockTranscriber>,
        chat: Arc<MockChatModel>,
    }

    fn harness(
        converter: MockWaveformConverter,
        transcriber: MockTranscriber,
        chat: MockChatModel,
    ) -> Harness {
        let dir = TempDir::new().unwrap();
        let upload_dir = dir.path().join("temp_audio");
        let mut config = Config::default();
        config.audio.upload_dir = upload_dir.clone();
        config.audio.max_upload_bytes = 1024;

        let converter = Arc::new(converter);
        let transcriber = Arc::new(transcriber);
        let chat = Arc::new(chat);
        let pipeline = Pipeline::new(
            &config,
            converter.clone(),
            Arc::new(SpeechRecognizer::preloaded(
                transcriber.clone(),
                Duration::from_secs(5),
            )),
            chat.clone(),
            Arc::new(MockSpeechEngine::new()),
        );

        Harness {
            _dir: dir,
            upload_dir,
            pipeline,
            converter,
            transcriber,
            chat,
        }
    }

    #[test]
    fn test_empty_blob_rejected_before_disk() {
        let h = harness(
            MockWaveformConverter::new(),
            MockTranscriber::new("mock"),
            MockChatModel::new(),
        );

        let err = h.pipeline.analyze(AudioBlob::new(Vec::new())).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAudio);
        assert_eq!(err.message, "오디오 파일이 비어 있습니다.");
        assert!(!h.upload_dir.exists());
        assert_eq!(h.converter.call_count(), 0);
    }

    #[test]
    fn test_declared_oversize_rejected() {
        let h = harness(
            MockWaveformConverter::new(),
            MockTranscriber::new("mock"),
            MockChatModel::new(),
        );

        let blob = AudioBlob::with_declared_size(vec![1; 16], 4096);
        let err = h.pipeline.analyze(blob).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAudio);
        assert!(!h.upload_dir.exists());
    }

    #[test]
    fn test_transcription_failure_maps_to_whisper_failed() {
        let h = harness(
            MockWaveformConverter::new(),
            MockTranscriber::new("mock").with_failure(),
            MockChatModel::new(),
        );

        let err = h.pipeline.analyze(AudioBlob::new(vec![7; 64])).unwrap_err();
        assert_eq!(err.code, ErrorCode::WhisperFailed);
        assert_eq!(err.status(), 500);
        assert!(err.details.unwrap().contains("mock transcription failure"));
        assert!(files_with_prefix(&h.upload_dir, "upload_").unwrap().is_empty());
        assert_eq!(h.chat.call_count(), 0);
    }

    #[test]
    fn test_silent_transcript_short_circuits() {
        let h = harness(
            MockWaveformConverter::new(),
            MockTranscriber::new("mock").with_response("   "),
            MockChatModel::new(),
        );

        let result = h.pipeline.analyze(AudioBlob::new(vec![7; 64])).unwrap();
        assert_eq!(result.data.emotion, Emotion::Neutral);
        assert_eq!(result.data.state, ConversationState::Listening);
        assert_eq!(result.data.intensity, 0.0);
        assert_eq!(result.data.confidence, 0.0);
        assert_eq!(result.data.language, "ko");
        assert!(result.data.audio_url.is_empty());
        assert_eq!(h.chat.call_count(), 0);
        assert_eq!(h.transcriber.call_count(), 1);
    }

    #[test]
    fn test_full_run_builds_audio_url() {
        let h = harness(
            MockWaveformConverter::new(),
            MockTranscriber::new("mock").with_response("오늘 기분 좋아"),
            MockChatModel::new()
                .with_reply(r#"{"emotion": "happy", "intensity": 0.7, "state": "speaking", "keywords": ["기분"]}"#)
                .with_reply("좋은 하루네요!"),
        );

        let result = h.pipeline.analyze(AudioBlob::new(vec![7; 64])).unwrap();
        assert_eq!(result.data.emotion, Emotion::Happy);
        assert_eq!(result.data.intensity, 0.7);
        assert_eq!(result.data.response_text, "좋은 하루네요!");
        assert!(result.data.audio_url.starts_with("/api/audio/tts_"));
        assert!(result.processing_time >= 0.0);
        assert_eq!(h.chat.call_count(), 2);
        assert!(files_with_prefix(&h.upload_dir, "upload_").unwrap().is_empty());
        assert_eq!(files_with_prefix(&h.upload_dir, "tts_").unwrap().len(), 1);
    }
}

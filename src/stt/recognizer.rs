//! Lazily loaded, process-wide speech recognizer.
//!
//! The Whisper model is loaded on first use and shared by every request
//! after that. Concurrent first requests block on the same initialization
//! and the model is loaded exactly once. A failed load leaves the cell empty
//! so the next request tries again.

use crate::audio::wav;
use crate::config::SttConfig;
use crate::error::{Result, VoiceError};
use crate::models::download::resolve_model_path;
use crate::stt::transcriber::{CancelToken, Transcriber, Transcript};
use crate::stt::whisper::{WhisperConfig, WhisperTranscriber};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Builds the transcriber on first use.
pub type TranscriberLoader = Box<dyn Fn() -> Result<Arc<dyn Transcriber>> + Send + Sync>;

pub struct SpeechRecognizer {
    model: OnceCell<Arc<dyn Transcriber>>,
    loader: TranscriberLoader,
    timeout: Duration,
}

impl std::fmt::Debug for SpeechRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechRecognizer")
            .field("loaded", &self.is_loaded())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SpeechRecognizer {
    pub fn new(loader: TranscriberLoader, timeout: Duration) -> Self {
        Self {
            model: OnceCell::new(),
            loader,
            timeout,
        }
    }

    /// Recognizer backed by Whisper, configured from `[stt]`.
    pub fn from_config(config: &SttConfig) -> Self {
        let whisper = WhisperConfig {
            model_path: resolve_model_path(&config.model),
            language: config.language.clone(),
            threads: config.threads,
            use_gpu: config.use_gpu,
        };

        let loader: TranscriberLoader = Box::new(move || {
            tracing::info!(path = %whisper.model_path.display(), "loading whisper model");
            let transcriber = WhisperTranscriber::new(whisper.clone())?;
            Ok(Arc::new(transcriber) as Arc<dyn Transcriber>)
        });

        Self::new(loader, Duration::from_secs(config.timeout_secs))
    }

    /// Recognizer around an already constructed transcriber.
    pub fn preloaded(transcriber: Arc<dyn Transcriber>, timeout: Duration) -> Self {
        Self {
            model: OnceCell::with_value(transcriber),
            loader: Box::new(|| {
                Err(VoiceError::Other(
                    "preloaded recognizer has no loader".to_string(),
                ))
            }),
            timeout,
        }
    }

    /// Load the model if needed and return a handle to it.
    pub fn ensure_loaded(&self) -> Result<Arc<dyn Transcriber>> {
        self.model
            .get_or_try_init(|| {
                let started = Instant::now();
                let transcriber = (self.loader)()?;
                tracing::info!(
                    model = transcriber.model_name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "speech model ready"
                );
                Ok(transcriber)
            })
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Transcribe a normalized waveform file.
    pub fn transcribe(&self, waveform: &Path) -> Result<Transcript> {
        let samples = wav::read_waveform(waveform).map_err(|e| VoiceError::TranscriptionFailed {
            message: e.to_string(),
        })?;
        self.transcribe_samples(samples)
    }

    /// Transcribe samples on a worker thread, bounded by the configured timeout.
    ///
    /// On timeout the worker's cancel token is set. Whisper aborts inference
    /// at its next callback check and releases the model for the next request.
    pub fn transcribe_samples(&self, samples: Vec<i16>) -> Result<Transcript> {
        let transcriber = self.ensure_loaded().map_err(|e| match e {
            e @ (VoiceError::TranscriptionModelNotFound { .. }
            | VoiceError::TranscriptionFailed { .. }) => e,
            other => VoiceError::TranscriptionFailed {
                message: format!("model load failed: {}", other),
            },
        })?;

        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::Builder::new()
            .name("whisper-infer".to_string())
            .spawn(move || {
                let result = transcriber.transcribe(&samples, &worker_cancel);
                if tx.send(result).is_err() {
                    tracing::debug!("transcription finished after the caller gave up");
                }
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                cancel.cancel();
                tracing::warn!(timeout = ?self.timeout, "transcription timed out, aborting inference");
                Err(VoiceError::TranscriptionFailed {
                    message: format!("timed out after {:?}", self.timeout),
                })
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(VoiceError::TranscriptionFailed {
                    message: "inference thread exited without a result".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::transcriber::MockTranscriber;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_loader(
        loads: Arc<AtomicUsize>,
        fail_first: usize,
        text: &'static str,
    ) -> TranscriberLoader {
        Box::new(move || {
            let attempt = loads.fetch_add(1, Ordering::SeqCst);
            if attempt < fail_first {
                return Err(VoiceError::TranscriptionModelNotFound {
                    path: "/models/ggml-small.bin".to_string(),
                });
            }
            std::thread::sleep(Duration::from_millis(20));
            Ok(Arc::new(MockTranscriber::new("mock").with_response(text)) as Arc<dyn Transcriber>)
        })
    }

    #[test]
    fn loads_lazily_on_first_use() {
        let loads = Arc::new(AtomicUsize::new(0));
        let recognizer =
            SpeechRecognizer::new(counting_loader(loads.clone(), 0, "hi"), Duration::from_secs(5));

        assert!(!recognizer.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        recognizer.ensure_loaded().unwrap();
        assert!(recognizer.is_loaded());
        recognizer.ensure_loaded().unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_requests_load_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let recognizer = Arc::new(SpeechRecognizer::new(
            counting_loader(loads.clone(), 0, "hi"),
            Duration::from_secs(5),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let recognizer = recognizer.clone();
                std::thread::spawn(move || recognizer.transcribe_samples(vec![0; 160]).unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().text, "hi");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_is_retried_on_next_request() {
        let loads = Arc::new(AtomicUsize::new(0));
        let recognizer =
            SpeechRecognizer::new(counting_loader(loads.clone(), 1, "retry"), Duration::from_secs(5));

        let first = recognizer.transcribe_samples(vec![0; 160]);
        assert!(matches!(
            first,
            Err(VoiceError::TranscriptionModelNotFound { .. })
        ));
        assert!(!recognizer.is_loaded());

        let second = recognizer.transcribe_samples(vec![0; 160]).unwrap();
        assert_eq!(second.text, "retry");
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transcribe_reads_waveform_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload_x.wav");
        wav::write_waveform(&path, &[0; 1600]).unwrap();

        let recognizer = SpeechRecognizer::preloaded(
            Arc::new(MockTranscriber::new("mock").with_response("파일")),
            Duration::from_secs(5),
        );
        assert!(recognizer.is_loaded());
        assert_eq!(recognizer.transcribe(&path).unwrap().text, "파일");
    }

    #[test]
    fn unreadable_waveform_is_transcription_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload_x.wav");
        std::fs::write(&path, b"not a wav").unwrap();

        let recognizer = SpeechRecognizer::preloaded(
            Arc::new(MockTranscriber::new("mock")),
            Duration::from_secs(5),
        );
        let err = recognizer.transcribe(&path).unwrap_err();
        assert!(matches!(err, VoiceError::TranscriptionFailed { .. }));
        assert!(err.to_string().contains("Whisper"));
    }

    struct SlowTranscriber;

    impl Transcriber for SlowTranscriber {
        fn transcribe(&self, _audio: &[i16], _cancel: &CancelToken) -> Result<Transcript> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Transcript::default())
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[test]
    fn inference_is_bounded_by_timeout() {
        let recognizer =
            SpeechRecognizer::preloaded(Arc::new(SlowTranscriber), Duration::from_millis(50));

        match recognizer.transcribe_samples(vec![0; 16]) {
            Err(VoiceError::TranscriptionFailed { message }) => {
                assert_eq!(message, "timed out after 50ms");
            }
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    /// Holds one lock for the whole call, like the shared whisper context.
    /// The first call runs long unless cancelled; later calls are instant.
    struct SerialTranscriber {
        context: std::sync::Mutex<usize>,
    }

    impl Transcriber for SerialTranscriber {
        fn transcribe(&self, _audio: &[i16], cancel: &CancelToken) -> Result<Transcript> {
            let mut calls = self.context.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                let started = Instant::now();
                while started.elapsed() < Duration::from_millis(1500) {
                    if cancel.is_cancelled() {
                        return Err(VoiceError::TranscriptionFailed {
                            message: "inference aborted".to_string(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
            Ok(Transcript {
                text: format!("call {calls}"),
                ..Transcript::default()
            })
        }

        fn model_name(&self) -> &str {
            "serial"
        }
    }

    #[test]
    fn timed_out_inference_releases_model_for_next_request() {
        let recognizer = SpeechRecognizer::preloaded(
            Arc::new(SerialTranscriber {
                context: std::sync::Mutex::new(0),
            }),
            Duration::from_millis(400),
        );

        let first = recognizer.transcribe_samples(vec![0; 16]);
        assert!(matches!(first, Err(VoiceError::TranscriptionFailed { .. })));

        let started = Instant::now();
        let second = recognizer.transcribe_samples(vec![0; 16]).unwrap();
        assert_eq!(second.text, "call 2");
        assert!(
            started.elapsed() < Duration::from_millis(300),
            "second request waited {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn transcriber_errors_propagate() {
        let recognizer = SpeechRecognizer::preloaded(
            Arc::new(MockTranscriber::new("mock").with_failure()),
            Duration::from_secs(5),
        );
        assert!(matches!(
            recognizer.transcribe_samples(vec![0; 16]),
            Err(VoiceError::TranscriptionFailed { .. })
        ));
    }
}

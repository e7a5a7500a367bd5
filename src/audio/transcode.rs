//! Container → normalized waveform conversion.
//!
//! ffmpeg is the primary path. When it is not installed at all, the
//! in-process symphonia decoder takes over. Any other ffmpeg failure
//! (bad input, timeout) is final and is not retried with the decoder.

use crate::audio::decode::SymphoniaDecoder;
use crate::audio::process::{ProcessRunner, SystemProcessRunner};
use crate::audio::wav;
use crate::config::AudioConfig;
use crate::error::{Result, VoiceError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Max characters of tool stderr carried into an error message.
const STDERR_EXCERPT_CHARS: usize = 200;

/// Converts an arbitrary audio container into a 16kHz mono PCM WAV.
pub trait WaveformConverter: Send + Sync {
    /// Read `container` and write the normalized waveform to `output`.
    fn to_waveform(&self, container: &Path, output: &Path) -> Result<()>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// ffmpeg-backed converter.
#[derive(Debug)]
pub struct FfmpegConverter<R: ProcessRunner = SystemProcessRunner> {
    runner: R,
    program: String,
    timeout: Duration,
}

impl FfmpegConverter<SystemProcessRunner> {
    pub fn new(program: &str, timeout: Duration) -> Self {
        Self::with_runner(SystemProcessRunner::new(), program, timeout)
    }
}

impl<R: ProcessRunner> FfmpegConverter<R> {
    pub fn with_runner(runner: R, program: &str, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.to_string(),
            timeout,
        }
    }
}

impl<R: ProcessRunner> WaveformConverter for FfmpegConverter<R> {
    fn to_waveform(&self, container: &Path, output: &Path) -> Result<()> {
        let input = container.to_string_lossy();
        let target = output.to_string_lossy();
        let rate = crate::defaults::SAMPLE_RATE.to_string();
        let args = [
            "-y",
            "-i",
            input.as_ref(),
            "-ar",
            rate.as_str(),
            "-ac",
            "1",
            "-acodec",
            "pcm_s16le",
            target.as_ref(),
        ];

        let result = self.runner.run(&self.program, &args, self.timeout)?;
        if !result.success {
            return Err(VoiceError::ConversionFailed {
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    result
                        .code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string()),
                    stderr_excerpt(&result.stderr)
                ),
            });
        }

        tracing::debug!(output = %output.display(), "ffmpeg conversion done");
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn stderr_excerpt(stderr: &str) -> String {
    stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect()
}

/// Primary converter with an in-process fallback for a missing tool.
pub struct Transcoder {
    primary: Box<dyn WaveformConverter>,
    fallback: Box<dyn WaveformConverter>,
}

impl Transcoder {
    pub fn new(primary: Box<dyn WaveformConverter>, fallback: Box<dyn WaveformConverter>) -> Self {
        Self { primary, fallback }
    }

    /// ffmpeg from config with the symphonia decoder as fallback.
    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(
            Box::new(FfmpegConverter::new(
                &config.ffmpeg_path,
                Duration::from_secs(config.transcode_timeout_secs),
            )),
            Box::new(SymphoniaDecoder::new()),
        )
    }
}

impl WaveformConverter for Transcoder {
    fn to_waveform(&self, container: &Path, output: &Path) -> Result<()> {
        match self.primary.to_waveform(container, output) {
            Err(VoiceError::ConversionToolNotFound { tool }) => {
                tracing::warn!(
                    "{} not found, decoding with {}",
                    tool,
                    self.fallback.name()
                );
                self.fallback
                    .to_waveform(container, output)
                    .map_err(|e| VoiceError::ConversionFailed {
                        message: format!(
                            "{}. Install ffmpeg for broader format support: https://ffmpeg.org/download.html",
                            e
                        ),
                    })
            }
            other => other,
        }
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

/// Scripted converter for tests.
///
/// On success it writes the configured samples as a normalized waveform; on
/// failure it returns `ConversionFailed` without touching the output path.
#[derive(Debug)]
pub struct MockWaveformConverter {
    samples: Vec<i16>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockWaveformConverter {
    /// Converter that produces one second of silence.
    pub fn new() -> Self {
        Self {
            samples: vec![0; crate::defaults::SAMPLE_RATE as usize],
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockWaveformConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformConverter for MockWaveformConverter {
    fn to_waveform(&self, container: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !container.exists() {
            return Err(VoiceError::ConversionFailed {
                message: format!("input {} does not exist", container.display()),
            });
        }

        if let Some(message) = &self.failure {
            return Err(VoiceError::ConversionFailed {
                message: message.clone(),
            });
        }

        wav::write_waveform(output, &self.samples)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::process::ProcessOutput;
    use crate::audio::process::mock::MockProcessRunner;
    use tempfile::TempDir;

    fn ffmpeg_with(runner: MockProcessRunner) -> FfmpegConverter<MockProcessRunner> {
        FfmpegConverter::with_runner(runner, "ffmpeg", Duration::from_secs(30))
    }

    #[test]
    fn ffmpeg_invoked_with_normalizing_arguments() {
        let converter = ffmpeg_with(MockProcessRunner::new());
        converter
            .to_waveform(Path::new("/tmp/in.webm"), Path::new("/tmp/out.wav"))
            .unwrap();

        let calls = converter.runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "ffmpeg");
        assert_eq!(
            calls[0].1,
            vec![
                "-y",
                "-i",
                "/tmp/in.webm",
                "-ar",
                "16000",
                "-ac",
                "1",
                "-acodec",
                "pcm_s16le",
                "/tmp/out.wav"
            ]
        );
    }

    #[test]
    fn ffmpeg_nonzero_exit_truncates_stderr() {
        let long_stderr = "z".repeat(500);
        let converter = ffmpeg_with(MockProcessRunner::new().with_output(ProcessOutput {
            success: false,
            code: Some(1),
            stderr: long_stderr,
            ..Default::default()
        }));

        let err = converter
            .to_waveform(Path::new("in.webm"), Path::new("out.wav"))
            .unwrap_err();
        match err {
            VoiceError::ConversionFailed { message } => {
                assert!(message.starts_with("ffmpeg exited with 1: "));
                assert_eq!(message.matches('z').count(), 200);
            }
            other => panic!("Expected ConversionFailed, got {:?}", other),
        }
    }

    #[test]
    fn stderr_excerpt_counts_characters_not_bytes() {
        let korean = "오류".repeat(150);
        assert_eq!(stderr_excerpt(&korean).chars().count(), 200);
    }

    #[test]
    fn transcoder_falls_back_only_when_tool_missing() {
        let dir = TempDir::new().unwrap();
        let container = dir.path().join("upload_x.webm");
        std::fs::write(&container, b"bytes").unwrap();
        let output = dir.path().join("upload_x.wav");

        let primary = ffmpeg_with(MockProcessRunner::new().with_error(
            VoiceError::ConversionToolNotFound {
                tool: "ffmpeg".to_string(),
            },
        ));
        let transcoder = Transcoder::new(
            Box::new(primary),
            Box::new(MockWaveformConverter::new().with_samples(vec![1, 2, 3])),
        );

        transcoder.to_waveform(&container, &output).unwrap();
        assert_eq!(wav::read_waveform(&output).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn transcoder_does_not_fall_back_on_timeout() {
        let dir = TempDir::new().unwrap();
        let container = dir.path().join("upload_x.webm");
        std::fs::write(&container, b"bytes").unwrap();
        let output = dir.path().join("upload_x.wav");

        let fallback = std::sync::Arc::new(MockWaveformConverter::new());
        let primary = ffmpeg_with(MockProcessRunner::new().with_error(
            VoiceError::ConversionFailed {
                message: "ffmpeg timed out after 30s".to_string(),
            },
        ));
        let transcoder = Transcoder::new(Box::new(primary), Box::new(SharedMock(fallback.clone())));

        let err = transcoder.to_waveform(&container, &output).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(fallback.call_count(), 0);
        assert!(!output.exists());
    }

    #[test]
    fn transcoder_fallback_failure_mentions_ffmpeg_install() {
        let dir = TempDir::new().unwrap();
        let container = dir.path().join("upload_x.webm");
        std::fs::write(&container, b"bytes").unwrap();
        let output = dir.path().join("upload_x.wav");

        let primary = ffmpeg_with(MockProcessRunner::new().with_error(
            VoiceError::ConversionToolNotFound {
                tool: "ffmpeg".to_string(),
            },
        ));
        let transcoder = Transcoder::new(
            Box::new(primary),
            Box::new(MockWaveformConverter::new().with_failure("unsupported codec")),
        );

        match transcoder.to_waveform(&container, &output) {
            Err(VoiceError::ConversionFailed { message }) => {
                assert!(message.contains("unsupported codec"));
                assert!(message.contains("Install ffmpeg"));
            }
            other => panic!("Expected ConversionFailed, got {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn mock_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let container = dir.path().join("in.webm");
        std::fs::write(&container, b"bytes").unwrap();
        let output = dir.path().join("out.wav");

        let mock = MockWaveformConverter::new().with_failure("broken");
        assert!(mock.to_waveform(&container, &output).is_err());
        assert!(!output.exists());
        assert_eq!(mock.call_count(), 1);
    }

    struct SharedMock(std::sync::Arc<MockWaveformConverter>);

    impl WaveformConverter for SharedMock {
        fn to_waveform(&self, container: &Path, output: &Path) -> Result<()> {
            self.0.to_waveform(container, output)
        }

        fn name(&self) -> &str {
            self.0.name()
        }
    }
}

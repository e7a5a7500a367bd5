//! Default configuration constants for mindvoice.
//!
//! Shared by the config types, the pipeline stages and the CLI so that
//! every entry point agrees on the same limits and model settings.

/// Target sample rate of the normalized waveform in Hz.
///
/// 16kHz is what Whisper expects; every transcoding path converges on it.
pub const SAMPLE_RATE: u32 = 16000;

/// Maximum accepted upload size in bytes (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Hard bound on the external transcoding process, in seconds.
pub const TRANSCODE_TIMEOUT_SECS: u64 = 30;

/// Bound on a single Whisper inference, in seconds.
pub const TRANSCRIBE_TIMEOUT_SECS: u64 = 120;

/// Bound on a single chat model request, in seconds.
pub const CHAT_TIMEOUT_SECS: u64 = 30;

/// Bound on a single speech synthesis request, in seconds.
pub const SYNTHESIS_TIMEOUT_SECS: u64 = 30;

/// Default media tool used for transcoding.
pub const FFMPEG: &str = "ffmpeg";

/// Default Whisper model name.
///
/// "small" (multilingual) is the smallest model that handles Korean well.
pub const DEFAULT_MODEL: &str = "small";

/// Default transcription language. Forced, not auto-detected.
pub const DEFAULT_LANGUAGE: &str = "ko";

/// Default Ollama endpoint.
pub const OLLAMA_HOST: &str = "http://localhost:11434";

/// Default Ollama model tag.
pub const OLLAMA_MODEL: &str = "llama3:8b";

/// Default OpenAI-compatible speech endpoint (edge-tts bridge).
pub const TTS_ENDPOINT: &str = "http://localhost:5050/v1/audio/speech";

/// Default synthesis voice.
pub const TTS_VOICE: &str = "ko-KR-SunHiNeural";

/// Default synthesized audio format, also used as the file extension.
pub const TTS_FORMAT: &str = "mp3";

/// URL prefix under which synthesized artifacts are served.
pub const AUDIO_URL_PREFIX: &str = "/api/audio/";

/// Default HTTP port.
pub const SERVER_PORT: u16 = 5000;

/// Origins allowed by CORS (the Vite dev server and a plain static host).
pub const CORS_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:3000"];

/// Filename prefix of per-request temporary files.
///
/// Anything matching `upload_*` in the upload directory belongs to an
/// in-flight request and is gone once that request completes.
pub const UPLOAD_PREFIX: &str = "upload_";

/// Filename prefix of synthesized replies.
pub const TTS_PREFIX: &str = "tts_";

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// Only one GPU backend can be active at a time; if none is enabled, returns "CPU".
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS (AMD)"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}

/// Default upload/artifact directory: `<tmp>/mindvoice/temp_audio`.
pub fn upload_dir() -> std::path::PathBuf {
    std::env::temp_dir().join("mindvoice").join("temp_audio")
}

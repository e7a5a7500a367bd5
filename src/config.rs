use crate::defaults;
use crate::error::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Upload handling and transcoding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Directory for per-request temp files and synthesized replies
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub transcode_timeout_secs: u64,
    pub ffmpeg_path: String,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Model name from the catalog, or a path to a ggml model file
    pub model: String,
    pub language: String,
    pub threads: Option<usize>,
    pub use_gpu: bool,
    pub timeout_secs: u64,
}

/// Generative text model (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub host: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsConfig {
    pub endpoint: String,
    pub voice: String,
    /// Audio format requested from the engine, also the file extension
    pub format: String,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            cors_origins: defaults::CORS_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            upload_dir: defaults::upload_dir(),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            transcode_timeout_secs: defaults::TRANSCODE_TIMEOUT_SECS,
            ffmpeg_path: defaults::FFMPEG.to_string(),
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
            use_gpu: false,
            timeout_secs: defaults::TRANSCRIBE_TIMEOUT_SECS,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            host: defaults::OLLAMA_HOST.to_string(),
            model: defaults::OLLAMA_MODEL.to_string(),
            timeout_secs: defaults::CHAT_TIMEOUT_SECS,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::TTS_ENDPOINT.to_string(),
            voice: defaults::TTS_VOICE.to_string(),
            format: defaults::TTS_FORMAT.to_string(),
            timeout_secs: defaults::SYNTHESIS_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e.context(format!("Failed to load config from {}", path.display())))
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - WHISPER_MODEL → stt.model
    /// - OLLAMA_MODEL → llm.model
    /// - OLLAMA_HOST → llm.host
    /// - MINDVOICE_UPLOAD_DIR → audio.upload_dir
    /// - MINDVOICE_PORT → server.port (ignored unless it parses)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("WHISPER_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(model) = std::env::var("OLLAMA_MODEL")
            && !model.is_empty()
        {
            self.llm.model = model;
        }

        if let Ok(host) = std::env::var("OLLAMA_HOST")
            && !host.is_empty()
        {
            self.llm.host = host;
        }

        if let Ok(dir) = std::env::var("MINDVOICE_UPLOAD_DIR")
            && !dir.is_empty()
        {
            self.audio.upload_dir = PathBuf::from(dir);
        }

        if let Ok(port) = std::env::var("MINDVOICE_PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            self.server.port = port;
        }

        self
    }

    /// Reject values that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> VoiceError {
            VoiceError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.audio.max_upload_bytes == 0 {
            return Err(invalid("audio.max_upload_bytes", "must be positive"));
        }
        if self.audio.transcode_timeout_secs == 0 {
            return Err(invalid("audio.transcode_timeout_secs", "must be positive"));
        }
        if self.stt.model.trim().is_empty() {
            return Err(invalid("stt.model", "must not be empty"));
        }
        if self.stt.timeout_secs == 0 {
            return Err(invalid("stt.timeout_secs", "must be positive"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs", "must be positive"));
        }
        if self.tts.timeout_secs == 0 {
            return Err(invalid("tts.timeout_secs", "must be positive"));
        }
        if self.tts.format.trim().is_empty() || self.tts.format.contains(['/', '.']) {
            return Err(invalid("tts.format", "must be a bare file extension"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/mindvoice/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("mindvoice")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_env() {
        remove_env("WHISPER_MODEL");
        remove_env("OLLAMA_MODEL");
        remove_env("OLLAMA_HOST");
        remove_env("MINDVOICE_UPLOAD_DIR");
        remove_env("MINDVOICE_PORT");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.cors_origins.len(), 2);

        assert_eq!(config.audio.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.audio.transcode_timeout_secs, 30);
        assert_eq!(config.audio.ffmpeg_path, "ffmpeg");

        assert_eq!(config.stt.model, "small");
        assert_eq!(config.stt.language, "ko");
        assert!(!config.stt.use_gpu);

        assert_eq!(config.llm.host, "http://localhost:11434");
        assert_eq!(config.llm.model, "llama3:8b");

        assert_eq!(config.tts.voice, "ko-KR-SunHiNeural");
        assert_eq!(config.tts.format, "mp3");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [server]
            port = 8080
            cors_origins = ["http://example.test"]

            [audio]
            upload_dir = "/var/tmp/mindvoice"
            max_upload_bytes = 2048
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"

            [stt]
            model = "medium"
            language = "en"
            threads = 8

            [llm]
            model = "gemma3:4b"

            [tts]
            voice = "en-US-AriaNeural"
            format = "wav"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cors_origins, vec!["http://example.test"]);
        assert_eq!(config.audio.upload_dir, PathBuf::from("/var/tmp/mindvoice"));
        assert_eq!(config.audio.max_upload_bytes, 2048);
        assert_eq!(config.audio.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.stt.model, "medium");
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.stt.threads, Some(8));
        assert_eq!(config.llm.model, "gemma3:4b");
        assert_eq!(config.tts.voice, "en-US-AriaNeural");
        assert_eq!(config.tts.format, "wav");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [stt]
            model = "base"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.stt.model, "base");
        assert_eq!(config.stt.language, "ko");
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.llm, LlmConfig::default());
        assert_eq!(config.tts, TtsConfig::default());
    }

    #[test]
    fn test_env_override_models_and_host() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("WHISPER_MODEL", "tiny");
        set_env("OLLAMA_MODEL", "qwen2.5:7b");
        set_env("OLLAMA_HOST", "http://gpu-box:11434");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.stt.model, "tiny");
        assert_eq!(config.llm.model, "qwen2.5:7b");
        assert_eq!(config.llm.host, "http://gpu-box:11434");
        assert_eq!(config.stt.language, "ko"); // Not overridden

        clear_env();
    }

    #[test]
    fn test_env_override_upload_dir_and_port() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("MINDVOICE_UPLOAD_DIR", "/srv/audio");
        set_env("MINDVOICE_PORT", "9000");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.audio.upload_dir, PathBuf::from("/srv/audio"));
        assert_eq!(config.server.port, 9000);

        clear_env();
    }

    #[test]
    fn test_env_override_empty_or_invalid_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("WHISPER_MODEL", "");
        set_env("MINDVOICE_PORT", "not-a-port");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.stt.model, "small");
        assert_eq!(config.server.port, 5000);

        clear_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [audio
            upload_dir = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        assert!(Config::load(temp_file.path()).is_err());
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_mindvoice_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.audio.max_upload_bytes = 0;
        match config.validate() {
            Err(VoiceError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "audio.max_upload_bytes");
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }

        let mut config = Config::default();
        config.llm.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_tts_format() {
        let mut config = Config::default();
        config.tts.format = "../mp3".to_string();
        assert!(config.validate().is_err());

        config.tts.format = "wav".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("mindvoice"));
        assert!(path_str.ends_with("config.toml"));
    }
}

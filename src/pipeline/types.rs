//! Data types for the per-request analysis pipeline.

use std::fmt;

/// Uploaded audio as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    /// Raw container bytes (typically WebM/Opus from a browser).
    bytes: Vec<u8>,
    /// Size announced by the transport, if any. May differ from `bytes.len()`.
    declared_size: Option<u64>,
}

impl AudioBlob {
    /// Creates a blob whose declared size is its actual length.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            declared_size: None,
        }
    }

    /// Creates a blob with a transport-declared size.
    pub fn with_declared_size(bytes: Vec<u8>, declared_size: u64) -> Self {
        Self {
            bytes,
            declared_size: Some(declared_size),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The larger of the declared and actual size.
    pub fn effective_size(&self) -> u64 {
        self.declared_size.unwrap_or(0).max(self.len())
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Persist,
    Transcode,
    Transcribe,
    Classify,
    Respond,
    Synthesize,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Persist => "persist",
            Stage::Transcode => "transcode",
            Stage::Transcribe => "transcribe",
            Stage::Classify => "classify",
            Stage::Respond => "respond",
            Stage::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Voice analysis pipeline: upload in, envelope out.

pub mod envelope;
pub mod orchestrator;
pub mod types;

pub use envelope::{
    AnalysisData, AnalysisResult, AnalyzeError, ErrorCode, ErrorEnvelope, SuccessEnvelope,
    to_envelope,
};
pub use orchestrator::Pipeline;
pub use types::{AudioBlob, Stage};

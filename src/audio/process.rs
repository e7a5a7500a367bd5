//! Bounded execution of external tools.
//!
//! The `ProcessRunner` trait keeps the transcoder testable without ffmpeg
//! installed. The system implementation kills the child when the time bound
//! expires so a hung decoder never pins a worker.

use crate::bridge;
use crate::error::{Result, VoiceError};
use std::time::Duration;
use tokio::process::Command;

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Trait for running external commands with a time bound.
///
/// Object-safe, Send + Sync so one runner can serve concurrent requests.
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args`, waiting at most `timeout`.
    ///
    /// Returns `ConversionToolNotFound` if the program cannot be spawned
    /// because it does not exist, and `ConversionFailed` on timeout.
    /// A non-zero exit is not an error here; inspect `ProcessOutput::success`.
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<ProcessOutput>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<ProcessOutput> {
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let outcome = bridge::block_on(async move {
            tokio::time::timeout(timeout, command.output()).await
        })?;

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VoiceError::ConversionToolNotFound {
                    tool: program.to_string(),
                });
            }
            Ok(Err(e)) => {
                return Err(VoiceError::ConversionFailed {
                    message: format!("Failed to execute {}: {}", program, e),
                });
            }
            Err(_) => {
                return Err(VoiceError::ConversionFailed {
                    message: format!("{} timed out after {:?}", program, timeout),
                });
            }
        };

        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

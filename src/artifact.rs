//! Per-request temporary files with guaranteed removal.
//!
//! A [`TempArtifact`] owns a uniquely named path inside the upload directory.
//! Reserving a path does not create the file; whoever produces the content
//! writes it later. Dropping the guard removes the file if it exists, so every
//! exit from the pipeline (early return, `?`, panic unwind) cleans up.

use crate::defaults::UPLOAD_PREFIX;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Owned path to a transient file that is deleted on drop.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Reserve a fresh `upload_<uuid>.<extension>` path in `dir`.
    pub fn reserve(dir: &Path, extension: &str) -> Self {
        let name = format!("{}{}.{}", UPLOAD_PREFIX, Uuid::new_v4().simple(), extension);
        Self {
            path: dir.join(name),
        }
    }

    /// Reserve a path next to this one with the same stem and another extension.
    ///
    /// `upload_<id>.webm` → `upload_<id>.wav`.
    pub fn sibling(&self, extension: &str) -> Self {
        Self {
            path: self.path.with_extension(extension),
        }
    }

    /// Write `bytes` to the reserved path, replacing any previous content.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "temp file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "failed to remove temp file: {e}")
            }
        }
    }
}

/// List files in `dir` whose name starts with `prefix`.
///
/// Used by diagnostics and tests to check the temp-file invariant.
pub fn files_with_prefix(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(prefix))
        {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

//! Model storage and download.
//!
//! Models live in `<cache>/mindvoice/models/ggml-<name>.bin`. Downloads
//! stream into a `.part` file that is renamed only after the byte count
//! checks out, so an interrupted download never looks installed.

use crate::error::{Result, VoiceError};
use crate::models::catalog::{ModelInfo, resolve_name};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "model-download")]
use crate::models::catalog::get_model;
#[cfg(feature = "model-download")]
use futures_util::StreamExt;
#[cfg(feature = "model-download")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "model-download")]
use std::io::Write;

/// Get the directory where models are stored.
///
/// Uses `~/.cache/mindvoice/models/` on Linux.
pub fn models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("mindvoice")
        .join("models")
}

/// Get the full path for a model file.
///
/// Always returns a path regardless of whether the model is in the catalog.
pub fn model_path(name: &str) -> PathBuf {
    models_dir().join(format!("ggml-{}.bin", resolve_name(name)))
}

/// Resolve the configured model to a file path.
///
/// A value naming an existing file is used as-is; anything else is treated
/// as a catalog name inside the models directory.
pub fn resolve_model_path(model: &str) -> PathBuf {
    let direct = Path::new(model);
    if direct.is_file() {
        direct.to_path_buf()
    } else {
        model_path(model)
    }
}

/// Check if a model is installed.
pub fn is_model_installed(name: &str) -> bool {
    resolve_model_path(name).exists()
}

/// List all installed model names by scanning the models directory.
///
/// Returns model names with the `ggml-` prefix and `.bin` suffix stripped.
pub fn list_installed_models() -> Vec<String> {
    let entries = match fs::read_dir(models_dir()) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            let model = name.to_str()?.strip_prefix("ggml-")?.strip_suffix(".bin")?;
            entry.path().is_file().then(|| model.to_string())
        })
        .collect();

    names.sort();
    names
}

/// Format model information for display.
pub fn format_model_info(model: &ModelInfo) -> String {
    let status = if is_model_installed(model.name) {
        "[installed]"
    } else {
        "[not installed]"
    };
    format!(
        "{:16} {:5} MB   {:16} {}",
        model.name, model.size_mb, status, model.note
    )
}

/// Check the downloaded byte count against the server's declared length.
fn verify_size(written: u64, expected: Option<u64>) -> Result<()> {
    match expected {
        Some(expected) if expected != written => Err(VoiceError::Other(format!(
            "Download incomplete: expected {expected} bytes, got {written}"
        ))),
        _ if written == 0 => Err(VoiceError::Other("Download was empty".to_string())),
        _ => Ok(()),
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Core download: fetch url into `<output>.part`, check size, rename.
#[cfg(feature = "model-download")]
async fn download_to_path(info: &ModelInfo, output_path: &Path, progress: bool) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| VoiceError::Other(format!("Failed to create models directory: {e}")))?;
    }

    if progress {
        eprintln!("Downloading {} ({} MB)...", info.name, info.size_mb);
    }

    let response = reqwest::Client::new()
        .get(info.url())
        .send()
        .await
        .map_err(|e| VoiceError::Other(format!("Failed to start download: {e}")))?;

    if !response.status().is_success() {
        return Err(VoiceError::Other(format!(
            "Download failed with status: {}",
            response.status()
        )));
    }

    let total_size = response.content_length();

    let pb = if progress {
        let pb = ProgressBar::new(total_size.unwrap_or(0));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .map_err(|e| VoiceError::Other(format!("Invalid progress template: {e}")))?
            .progress_chars("#>-");
        pb.set_style(style);
        Some(pb)
    } else {
        None
    };

    let partial = part_path(output_path);
    let mut file = fs::File::create(&partial)
        .map_err(|e| VoiceError::Other(format!("Failed to create output file: {e}")))?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    let streamed: Result<()> = async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| VoiceError::Other(format!("Failed to read download chunk: {e}")))?;
            file.write_all(&chunk)
                .map_err(|e| VoiceError::Other(format!("Failed to write to file: {e}")))?;
            written += chunk.len() as u64;
            if let Some(ref pb) = pb {
                pb.inc(chunk.len() as u64);
            }
        }
        file.flush()?;
        verify_size(written, total_size)
    }
    .await;

    if let Err(e) = streamed {
        if let Err(remove_err) = fs::remove_file(&partial) {
            tracing::warn!("failed to remove partial download: {remove_err}");
        }
        return Err(e);
    }

    fs::rename(&partial, output_path)?;

    if let Some(pb) = pb {
        pb.finish_with_message("Downloaded");
    }
    if progress {
        eprintln!("Model installed to: {}", output_path.display());
    }

    Ok(())
}

/// Download a Whisper model from the catalog.
///
/// Returns the installed path. An already installed model is not downloaded
/// again.
#[cfg(feature = "model-download")]
pub async fn download_model(name: &str, progress: bool) -> Result<PathBuf> {
    let info = get_model(name).ok_or_else(|| {
        VoiceError::Other(format!(
            "Model '{name}' not found in catalog.\n\
             Run 'mindvoice models list' to see available models."
        ))
    })?;

    let path = model_path(info.name);
    if path.exists() {
        if progress {
            eprintln!(
                "Model '{}' is already installed at {}",
                info.name,
                path.display()
            );
        }
        return Ok(path);
    }

    download_to_path(info, &path, progress).await?;
    Ok(path)
}

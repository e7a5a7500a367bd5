//! System diagnostics and dependency checking.
//!
//! Verifies that the external tools and services the pipeline relies on are
//! installed and reachable.

use crate::config::Config;
use crate::defaults;
use crate::llm::{ChatModel, OllamaClient};
use crate::models::download::resolve_model_path;
use std::process::Command;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool is installed and working
    Ok,
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues (e.g., service not running)
    Warning(String),
}

/// Check if a command exists and is executable.
fn check_command(command: &str, version_flag: &str) -> CheckResult {
    match Command::new(command).arg(version_flag).output() {
        Ok(output) if output.status.success() => CheckResult::Ok,
        Ok(_) => CheckResult::Warning(format!("'{}' found but {} failed", command, version_flag)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error checking '{}': {}", command, e)),
    }
}

/// Check that the configured whisper model is on disk.
fn check_model(model: &str) -> CheckResult {
    let path = resolve_model_path(model);
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => CheckResult::Ok,
        Ok(_) => CheckResult::Warning(format!("{} exists but is empty", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error reading {}: {}", path.display(), e)),
    }
}

/// Check the speech endpoint setting. Reachability is only known at request time.
fn check_speech_endpoint(endpoint: &str) -> CheckResult {
    match reqwest::Url::parse(endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => CheckResult::Ok,
        Ok(url) => CheckResult::Warning(format!("unsupported scheme '{}'", url.scheme())),
        Err(e) => CheckResult::Warning(format!("invalid URL '{}': {}", endpoint, e)),
    }
}

/// Run all dependency checks and print results.
pub fn check_dependencies(config: &Config) {
    println!("Checking system dependencies...\n");

    print!("ffmpeg (transcoding): ");
    match check_command(&config.audio.ffmpeg_path, "-version") {
        CheckResult::Ok => println!("✓ OK"),
        CheckResult::NotFound => {
            println!("✗ NOT FOUND (falling back to the built-in decoder, WAV/MP3/FLAC/OGG only)");
            println!("  Install: sudo apt install ffmpeg  (Debian/Ubuntu)");
            println!("           sudo pacman -S ffmpeg    (Arch)");
            println!("           https://ffmpeg.org/download.html");
        }
        CheckResult::Warning(msg) => println!("⚠ WARNING: {}", msg),
    }

    print!("Whisper model '{}': ", config.stt.model);
    match check_model(&config.stt.model) {
        CheckResult::Ok => println!(
            "✓ OK ({})",
            resolve_model_path(&config.stt.model).display()
        ),
        CheckResult::NotFound => {
            println!("✗ NOT FOUND");
            println!("  Install: mindvoice models install {}", config.stt.model);
        }
        CheckResult::Warning(msg) => println!("⚠ WARNING: {}", msg),
    }

    print!("Ollama ({} at {}): ", config.llm.model, config.llm.host);
    if OllamaClient::from_config(&config.llm).is_connected() {
        println!("✓ OK");
    } else {
        println!("✗ UNREACHABLE (classification and replies will use fallbacks)");
        println!("  Start it with: ollama serve && ollama pull {}", config.llm.model);
    }

    print!("Speech endpoint: ");
    match check_speech_endpoint(&config.tts.endpoint) {
        CheckResult::Ok => println!("✓ {} (voice {})", config.tts.endpoint, config.tts.voice),
        CheckResult::NotFound => println!("✗ NOT CONFIGURED"),
        CheckResult::Warning(msg) => println!("⚠ WARNING: {}", msg),
    }

    println!();
    println!("Upload directory: {}", config.audio.upload_dir.display());

    println!();
    println!("GPU acceleration:");
    let compiled = defaults::gpu_backend();
    println!("  Compiled backend: {}", compiled);
    println!(
        "  stt.use_gpu:      {}",
        if config.stt.use_gpu { "on" } else { "off" }
    );
    check_gpu_nvidia(compiled);
    check_gpu_vulkan(compiled);
}

/// Check for NVIDIA GPU via `nvidia-smi`.
fn check_gpu_nvidia(compiled: &str) {
    print!("  NVIDIA (CUDA):   ");
    match Command::new("nvidia-smi")
        .arg("--query-gpu=gpu_name")
        .arg("--format=csv,noheader")
        .output()
    {
        Ok(output) if output.status.success() => {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if compiled == "CUDA" {
                println!("✓ Active ({})", name);
            } else {
                println!(
                    "✓ {} found → rebuild with: cargo build --release --features cuda",
                    name
                );
            }
        }
        _ => println!("- nvidia-smi not found"),
    }
}

/// Check for Vulkan support via `vulkaninfo`.
fn check_gpu_vulkan(compiled: &str) {
    print!("  Vulkan:          ");
    match Command::new("vulkaninfo").arg("--summary").output() {
        Ok(output) if output.status.success() => {
            if compiled == "Vulkan" {
                println!("✓ Active");
            } else {
                println!(
                    "✓ vulkaninfo found → rebuild with: cargo build --release --features vulkan"
                );
            }
        }
        _ => println!("- vulkaninfo not found"),
    }
}

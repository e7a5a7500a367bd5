//! Build script: embed the git hash and pre-flight GPU toolkits.
//!
//! whisper-rs-sys fails late and verbosely when a GPU toolkit is missing,
//! so the matching tool is probed first and the build stops with a short
//! message instead.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    // Features are visible to build scripts only through the environment.
    let enabled = |feature: &str| std::env::var_os(format!("CARGO_FEATURE_{feature}")).is_some();

    if enabled("CUDA") {
        require_tool("nvcc", &["--version"], "CUDA toolkit", "https://developer.nvidia.com/cuda-downloads");
    }
    if enabled("VULKAN") {
        require_tool("vulkaninfo", &["--summary"], "Vulkan SDK", "https://vulkan.lunarg.com/");
    }
    if enabled("HIPBLAS") {
        require_tool("rocminfo", &[], "ROCm", "https://rocm.docs.amd.com/");
    }
}

fn require_tool(tool: &str, args: &[&str], toolkit: &str, url: &str) {
    match Command::new(tool).args(args).output() {
        Ok(_) => println!("cargo::warning={} detected", toolkit),
        Err(_) => panic!(
            "\n\n`{}` not found: {} is not installed.\nInstall: {}\nOr build without GPU support: cargo build --release\n",
            tool, toolkit, url
        ),
    }
}

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use mindvoice::cli::{Cli, Commands, ModelsAction};
use mindvoice::config::Config;
use mindvoice::diagnostics::check_dependencies;
use mindvoice::models::catalog::list_models;
use mindvoice::models::download::{format_model_info, models_dir};
use mindvoice::pipeline::{AudioBlob, Pipeline, to_envelope};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    mindvoice::logging::init(cli.quiet, cli.verbose);

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref())?;
            run_server(config).await?;
        }
        Some(Commands::Serve { host, port }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await?;
        }
        Some(Commands::Analyze { file }) => {
            let config = load_config(cli.config.as_deref())?;
            handle_analyze_command(config, &file, cli.quiet).await?;
        }
        Some(Commands::Check) => {
            let config = load_config(cli.config.as_deref())?;
            check_dependencies(&config);
        }
        Some(Commands::Models { action }) => {
            handle_models_command(action).await?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "mindvoice",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/mindvoice/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides are applied last, then the result is validated.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

async fn run_server(config: Config) -> Result<()> {
    tracing::info!("mindvoice {}", mindvoice::version_string());
    mindvoice::server::serve(&config).await?;
    Ok(())
}

/// Run the pipeline once on a local file and print the envelope.
async fn handle_analyze_command(config: Config, file: &Path, quiet: bool) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let outcome = tokio::task::spawn_blocking(move || {
        Pipeline::from_config(&config).analyze(AudioBlob::new(bytes))
    })
    .await
    .context("analysis worker failed")?;

    let succeeded = outcome.is_ok();
    if !quiet && std::io::stderr().is_terminal() {
        match &outcome {
            Ok(result) => eprintln!(
                "{} {} ({:.2}, {}) in {:.2}s",
                "✓".green(),
                result.data.emotion.green(),
                result.data.intensity,
                result.data.state,
                result.processing_time
            ),
            Err(e) => eprintln!("{}", format!("✗ {}: {}", e.code, e.message).red()),
        }
    }

    let (_, envelope) = to_envelope(outcome);
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

/// Handle model management commands.
async fn handle_models_command(action: ModelsAction) -> Result<()> {
    match action {
        ModelsAction::List => {
            println!("Available models:");
            for model in list_models() {
                println!("  {}", format_model_info(model));
            }
            println!();
            println!(
                "{}",
                format!("Models are stored in {}", models_dir().display()).dimmed()
            );
        }
        ModelsAction::Install { name } => {
            install_model(&name).await?;
        }
    }
    Ok(())
}

#[cfg(feature = "model-download")]
async fn install_model(name: &str) -> Result<()> {
    let path = mindvoice::models::download::download_model(name, true).await?;
    println!("Model '{}' installed successfully", name);
    println!("Location: {}", path.display());
    Ok(())
}

#[cfg(not(feature = "model-download"))]
async fn install_model(name: &str) -> Result<()> {
    anyhow::bail!(
        "Cannot install '{}': this build was compiled without the model-download feature",
        name
    )
}

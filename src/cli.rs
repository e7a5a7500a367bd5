//! Command-line interface for mindvoice
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Emotion-aware voice conversation backend
#[derive(Parser, Debug)]
#[command(
    name = "mindvoice",
    version,
    about = "Emotion-aware voice conversation backend"
)]
pub struct Cli {
    /// Subcommand to execute (default: serve)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind (default from config: 0.0.0.0)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (default from config: 5000)
        #[arg(long, short = 'p', value_name = "PORT")]
        port: Option<u16>,
    },

    /// Analyze a local recording once and print the JSON envelope
    Analyze {
        /// Audio file in any container ffmpeg understands
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check system dependencies
    Check,

    /// Manage Whisper models
    Models {
        /// Action to perform
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Model management actions
#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// List available models
    List,
    /// Download and install a model
    Install {
        /// Model name (e.g., small, medium, large-v3-turbo)
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["mindvoice"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["mindvoice", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_verbose_repeated_flags() {
        let cli = Cli::try_parse_from(["mindvoice", "-v", "-v"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["mindvoice", "serve"]).unwrap();
        match cli.command {
            Some(Commands::Serve { host, port }) => {
                assert!(host.is_none());
                assert!(port.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_parse_serve_with_options() {
        let cli =
            Cli::try_parse_from(["mindvoice", "serve", "--host", "127.0.0.1", "-p", "8080"])
                .unwrap();
        match cli.command {
            Some(Commands::Serve { host, port }) => {
                assert_eq!(host.as_deref(), Some("127.0.0.1"));
                assert_eq!(port, Some(8080));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_serve_rejects_invalid_port() {
        assert!(Cli::try_parse_from(["mindvoice", "serve", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from(["mindvoice", "analyze", "clip.webm"]).unwrap();
        match cli.command {
            Some(Commands::Analyze { file }) => assert_eq!(file, PathBuf::from("clip.webm")),
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_analyze_requires_file() {
        assert!(Cli::try_parse_from(["mindvoice", "analyze"]).is_err());
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from(["mindvoice", "check"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Check)));
    }

    #[test]
    fn test_parse_models_list() {
        let cli = Cli::try_parse_from(["mindvoice", "models", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Models {
                action: ModelsAction::List
            })
        ));
    }

    #[test]
    fn test_parse_models_install() {
        let cli = Cli::try_parse_from(["mindvoice", "models", "install", "small"]).unwrap();
        match cli.command {
            Some(Commands::Models {
                action: ModelsAction::Install { name },
            }) => assert_eq!(name, "small"),
            _ => panic!("Expected Models Install command"),
        }
    }

    #[test]
    fn test_models_requires_subcommand() {
        assert!(Cli::try_parse_from(["mindvoice", "models"]).is_err());
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from([
            "mindvoice",
            "analyze",
            "clip.webm",
            "--config",
            "/tmp/mv.toml",
            "-q",
        ])
        .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/mv.toml")));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["mindvoice", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Bash })
        ));
    }

    #[test]
    fn test_invalid_command_returns_error() {
        assert!(Cli::try_parse_from(["mindvoice", "record"]).is_err());
    }
}

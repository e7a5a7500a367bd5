//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Default filter directive for the given CLI verbosity.
///
/// `quiet` wins over `verbose`.
pub fn default_directive(quiet: bool, verbose: u8) -> String {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    format!("mindvoice={level},tower_http={level}")
}

/// Install the global fmt subscriber. `RUST_LOG` overrides the CLI flags.
///
/// Calling it twice is harmless; the second subscriber is ignored.
pub fn init(quiet: bool, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(quiet, verbose)));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose > 0)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}

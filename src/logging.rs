//! Process-wide `tracing` subscriber setup.
//!
//! Filtering follows `RUST_LOG` (default `info`). Output is either
//! human-readable text or one JSON object per event for log shippers.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Log output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails when a global subscriber has already been installed.
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

//! Command-line options and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// HTTP service producing item lists, estimates and compliance reports
/// from construction documents.
#[derive(Parser, Debug)]
#[command(name = "smeta-server", version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, env = "SMETA_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Log format: text (default) or json.
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Default filter when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Without a subcommand the server runs.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Write sample works and materials catalogs to the configured paths.
    SeedCatalogs {
        /// Replace catalogs that already exist.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Installs the global subscriber and routes `log` records from the
/// library into it.
pub fn init_tracing(cli: &Cli) -> Result<(), String> {
    use tracing_subscriber::{fmt, EnvFilter};

    tracing_log::LogTracer::init().map_err(|e| format!("Failed to bridge log records: {e}"))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let installed = match cli.log_format {
        LogFormat::Text => fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .try_init(),
        LogFormat::Json => fmt().json().with_env_filter(env_filter).try_init(),
    };
    installed.map_err(|e| format!("Failed to install subscriber: {e}"))
}

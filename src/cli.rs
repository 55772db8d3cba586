// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `watchpool`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchpool",
    version,
    about = "Dispatch filesystem change events to a pool of worker processes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Watchpool.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Watchpool.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHPOOL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the config, print a summary, and exit.
    #[arg(long)]
    pub check: bool,

    /// Print the Prometheus text exposition of all metrics on shutdown.
    #[arg(long)]
    pub print_metrics: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

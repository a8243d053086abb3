// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `rtask`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rtask",
    version,
    about = "Run a synthetic workload on the rtask scheduler and report how it went.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to a config file (TOML). Defaults to `Rtask.toml` if present,
    /// otherwise built-in defaults and the `PARALLEL_LEVEL` environment
    /// variable are used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Override the concurrency ceiling.
    #[arg(long, value_name = "N")]
    pub parallel_level: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RTASK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the effective configuration and exit without running anything.
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Submit a batch of sleeping tasks and wait for them.
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Number of root tasks to submit.
    #[arg(long, default_value_t = 8)]
    pub tasks: usize,

    /// How long each task sleeps.
    #[arg(long, value_name = "MS", default_value_t = 100)]
    pub sleep_ms: u64,

    /// Make every K-th root task fail (0 = never).
    #[arg(long, value_name = "K", default_value_t = 0)]
    pub fail_every: usize,

    /// Continuations chained onto each root task.
    #[arg(long, value_name = "C", default_value_t = 0)]
    pub continuations: usize,

    /// Give up waiting after this long (negative = wait forever).
    #[arg(long, value_name = "MS", default_value_t = -1, allow_hyphen_values = true)]
    pub timeout_ms: i64,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            tasks: 8,
            sleep_ms: 100,
            fail_every: 0,
            continuations: 0,
            timeout_ms: -1,
        }
    }
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

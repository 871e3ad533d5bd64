//! CLI argument definitions
//!
//! All Clap derive structs for `PhantomFog` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Adaptive noise traffic engine.
#[derive(Parser, Debug)]
#[command(name = "phantomfog", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "PHANTOMFOG_COLOR")]
    pub color: ColorChoice,

    /// Diagnostic log format.
    #[arg(
        long,
        default_value = "human",
        global = true,
        env = "PHANTOMFOG_LOG_FORMAT"
    )]
    pub log_format: LogFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the noise engine with the console and dashboard.
    Run(RunArgs),

    /// Print a fingerprint of this host.
    Fingerprint(FingerprintArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Run Command
// ============================================================================

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "PHANTOMFOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target host or IP address (repeatable).
    #[arg(short, long = "target", value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Log sends without transmitting anything.
    #[arg(long, env = "PHANTOMFOG_DRY_RUN")]
    pub dry_run: bool,

    /// Dashboard bind address, `[host:]port`.
    #[arg(long, env = "PHANTOMFOG_DASHBOARD", conflicts_with = "no_dashboard")]
    pub dashboard: Option<String>,

    /// Do not start the dashboard.
    #[arg(long)]
    pub no_dashboard: bool,

    /// Directory for the event log and fingerprint.
    #[arg(long, env = "PHANTOMFOG_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Expose Prometheus metrics on 127.0.0.1:<PORT>.
    #[arg(long, env = "PHANTOMFOG_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Run without the interactive console until interrupted.
    #[arg(long)]
    pub no_console: bool,

    /// Do not mirror events to stdout.
    #[arg(long)]
    pub no_echo: bool,
}

// ============================================================================
// Fingerprint / Version
// ============================================================================

/// Arguments for `fingerprint`.
#[derive(Args, Debug)]
pub struct FingerprintArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================

//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`. The filter is scoped to this
//! crate: `-v` flags raise `phantomfog` spans and events while dependencies
//! (hyper, axum, tower) stay at `warn`. `PHANTOMFOG_LOG_LEVEL` replaces the
//! computed filter entirely. The JSONL event log is a separate stream and
//! ignores all of this.

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::args::ColorChoice;

/// Environment variable holding a full filter directive.
pub const LOG_LEVEL_ENV: &str = "PHANTOMFOG_LOG_LEVEL";

/// Rendering of diagnostic lines on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Plain text, colored when stderr is a terminal.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

/// Filter directive for the given flags.
///
/// `quiet` wins over any verbosity and keeps errors only.
#[must_use]
pub fn filter_directive(verbosity: u8, quiet: bool) -> String {
    let own = match (quiet, verbosity) {
        (true, _) => return "error".to_string(),
        (false, 0) => return "warn".to_string(),
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    format!("warn,{}={own}", env!("CARGO_CRATE_NAME"))
}

/// Whether stderr output should carry ANSI escapes.
#[must_use]
pub fn use_ansi(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
    }
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, quiet: bool, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity, quiet)));

    // Module paths only help once debug output is on.
    let with_target = verbosity >= 2;
    let (human, json) = match format {
        LogFormat::Human => (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_ansi(color))
                    .with_target(with_target),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false)
                    .with_target(with_target),
            ),
        ),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(human)
        .with(json)
        .try_init();
}

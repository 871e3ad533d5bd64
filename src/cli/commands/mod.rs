//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod fingerprint;
pub mod run;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::error::FogError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` fires when the process receives SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), FogError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Fingerprint(args) => fingerprint::run(&args),
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

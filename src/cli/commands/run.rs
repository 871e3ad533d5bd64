//! `run` command: bring up the engine, dashboard and console.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::config::loader::{FogConfig, LoadWarning, load_config, normalize_addresses};
use crate::config::{
    DEFAULT_DASHBOARD_ADDR, DEFAULT_OUTPUT_DIR, EngineLimits, FINGERPRINT_FILE_NAME, LOG_FILE_NAME,
};
use crate::console::run_console;
use crate::dashboard;
use crate::engine::{Engine, EngineOptions};
use crate::error::FogError;
use crate::fingerprint::Fingerprint;
use crate::observability::{EventLogger, init_metrics};
use crate::sender::{PacketSender, UdpSender};

/// How long shutdown waits for each task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Settings after merging the config file with CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Initial targets, file entries first.
    pub targets: Vec<String>,
    /// Simulate sends.
    pub dry_run: bool,
    /// Dashboard address, `None` when disabled.
    pub dashboard: Option<SocketAddr>,
    /// Event log and fingerprint directory.
    pub output_dir: PathBuf,
    /// Protected addresses beyond the built-in ones.
    pub extra_protected: Vec<String>,
}

/// Merges CLI flags over the file configuration.
///
/// # Errors
///
/// Returns a config error for an invalid target, a dashboard error for
/// an unparseable bind address, or a usage error for `--no-console`
/// without any target (nothing could ever be added).
pub fn resolve_settings(
    args: &RunArgs,
    config: FogConfig,
    warnings: &mut Vec<LoadWarning>,
) -> Result<RunSettings, FogError> {
    let mut targets = config.targets;
    targets.extend(args.targets.iter().cloned());
    let targets = normalize_addresses("targets", targets, warnings)?;
    if args.no_console && targets.is_empty() {
        return Err(FogError::Usage(
            "--no-console requires at least one target".to_string(),
        ));
    }

    let dashboard = if args.no_dashboard {
        None
    } else {
        let raw = args
            .dashboard
            .as_deref()
            .or(config.dashboard.as_deref())
            .unwrap_or(DEFAULT_DASHBOARD_ADDR);
        Some(dashboard::parse_bind_addr(raw)?)
    };

    Ok(RunSettings {
        targets,
        dry_run: args.dry_run || config.dry_run,
        dashboard,
        output_dir: args
            .output_dir
            .clone()
            .or(config.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        extra_protected: config.protected,
    })
}

/// Start the noise engine.
///
/// Returns once the console exits (or, with `--no-console`, once `cancel`
/// fires) and all tasks have been joined.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the sender socket
/// or dashboard listener cannot be bound, or the metrics exporter fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), FogError> {
    let (config, mut warnings) = match args.config {
        Some(ref path) => {
            tracing::info!(config = %path.display(), "loading configuration");
            let result = load_config(path)?;
            (result.config, result.warnings)
        }
        None => (FogConfig::default(), Vec::new()),
    };
    let settings = resolve_settings(args, config, &mut warnings)?;
    for warning in &warnings {
        tracing::warn!(location = %warning.location, "{}", warning.message);
    }

    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    prepare_output_dir(&settings.output_dir);
    let events = Arc::new(EventLogger::open(
        &settings.output_dir.join(LOG_FILE_NAME),
        !args.no_echo,
    ));

    let limits = EngineLimits::with_extra_protected(settings.extra_protected.iter().cloned());
    let sender = UdpSender::bind().await?.deny(limits.protected_ips());
    tracing::debug!(local = ?sender.local_addr().ok(), "sender socket bound");

    let engine = Engine::new(EngineOptions {
        targets: settings.targets.clone(),
        dry_run: settings.dry_run,
        limits,
        sender: Arc::new(sender) as Arc<dyn PacketSender>,
        events,
    });

    let dashboard_cancel = cancel.child_token();
    let dashboard_task = match settings.dashboard {
        Some(addr) => {
            let (bound, handle) =
                dashboard::serve(addr, Arc::clone(engine.state()), dashboard_cancel.clone())
                    .await?;
            eprintln!("PhantomFog running. Web dashboard: http://{bound}");
            Some(handle)
        }
        None => None,
    };

    engine.start();

    let console_result = if args.no_console {
        cancel.cancelled().await;
        engine.stop("signal");
        Ok(())
    } else {
        let stdin = BufReader::new(tokio::io::stdin());
        tokio::select! {
            result = run_console(&engine, stdin, tokio::io::stdout()) => result,
            () = cancel.cancelled() => {
                engine.stop("signal");
                Ok(())
            }
        }
    };

    engine.shutdown("shutdown", SHUTDOWN_GRACE).await;

    dashboard_cancel.cancel();
    if let Some(handle) = dashboard_task {
        if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
            tracing::warn!("dashboard did not shut down in time");
        }
    }

    console_result.map_err(FogError::from)
}

/// Creates the output directory and records the host fingerprint.
///
/// Failures are logged and otherwise ignored: the engine runs without a
/// persisted log rather than not at all.
fn prepare_output_dir(dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "cannot create output directory");
        return;
    }
    let fingerprint = Fingerprint::collect();
    if let Some(ref err) = fingerprint.error {
        tracing::warn!(error = %err, "fingerprint incomplete");
    }
    if let Err(e) = fingerprint.persist(&dir.join(FINGERPRINT_FILE_NAME)) {
        tracing::warn!(error = %e, "cannot write fingerprint");
    }
}

//! Metrics collection for `PhantomFog`.
//!
//! Prometheus-compatible counters and gauges describing engine activity.
//! No metric is labelled by target: targets are operator-supplied and
//! unbounded, so per-target detail stays in the event log.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::FogError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// What a worker cycle ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Datagram handed to the network stack.
    Sent,
    /// Transmission failed.
    Error,
    /// Send simulated.
    DryRun,
    /// Target is protected; nothing sent.
    Protected,
}

impl PacketOutcome {
    /// Label value for `phantomfog_packets_total`.
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Error => "error",
            Self::DryRun => "dry_run",
            Self::Protected => "protected",
        }
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `FogError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), FogError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| FogError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "phantomfog_packets_total",
        "Worker cycles by outcome (sent, error, dry_run, protected)"
    );
    describe_gauge!(
        "phantomfog_rate_per_minute",
        "Current per-target emission rate"
    );
    describe_gauge!("phantomfog_attack_score", "Current attack score");
    describe_gauge!("phantomfog_targets", "Number of targets in the target set");
    describe_gauge!(
        "phantomfog_workers_active",
        "Number of noise workers still running"
    );
}

/// Records the outcome of one worker cycle.
pub fn record_packet(outcome: PacketOutcome) {
    counter!("phantomfog_packets_total", "outcome" => outcome.as_label()).increment(1);
}

/// Records the result of a rate controller tick.
pub fn set_rate(rate_per_minute: f64, attack_score: f64) {
    gauge!("phantomfog_rate_per_minute").set(rate_per_minute);
    gauge!("phantomfog_attack_score").set(attack_score);
}

/// Sets the size of the target set.
#[allow(clippy::cast_precision_loss)]
pub fn set_targets(count: usize) {
    gauge!("phantomfog_targets").set(count as f64);
}

/// Adjusts the live worker gauge.
pub fn worker_started() {
    gauge!("phantomfog_workers_active").increment(1.0);
}

/// Adjusts the live worker gauge.
pub fn worker_stopped() {
    gauge!("phantomfog_workers_active").decrement(1.0);
}

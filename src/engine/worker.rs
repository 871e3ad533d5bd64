//! Noise worker: one long-running task per target.
//!
//! Each cycle snapshots the shared rate, skips protected targets, draws a
//! jittered pause, builds a payload, picks a port, then either records a
//! dry run or hands the datagram to the [`PacketSender`]. Send failures are
//! logged and never leave the worker.
//!
//! A worker is bound to its target for life. Removing the target from the
//! target set does not stop it; only [`EngineState::stop`] does.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, trace};

use crate::config::{EngineLimits, PROTECTED_PAUSE};
use crate::engine::payload::{jittered_pause, noise_payload, pick_port};
use crate::engine::state::EngineState;
use crate::observability::events::{Event, EventLogger};
use crate::observability::metrics::{self, PacketOutcome};
use crate::sender::PacketSender;

/// What one cycle did, and how long to wait before the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    /// Outcome of the cycle.
    pub outcome: PacketOutcome,
    /// Pause before the next cycle.
    pub pause: Duration,
}

/// Everything a worker needs, shared with the rest of the engine.
#[derive(Clone)]
pub struct WorkerContext {
    /// Shared engine state.
    pub state: Arc<EngineState>,
    /// Transmission capability.
    pub sender: Arc<dyn PacketSender>,
    /// Event sink.
    pub events: Arc<EventLogger>,
    /// Pacing and policy parameters.
    pub limits: Arc<EngineLimits>,
}

/// Traffic generator for a single target.
pub struct NoiseWorker {
    target: String,
    ctx: WorkerContext,
}

impl NoiseWorker {
    /// Creates a worker bound to `target`.
    #[must_use]
    pub fn new(target: impl Into<String>, ctx: WorkerContext) -> Self {
        Self {
            target: target.into(),
            ctx,
        }
    }

    /// Runs cycles until the engine stops.
    pub async fn run(self) {
        debug!(target_addr = %self.target, "noise worker started");
        metrics::worker_started();
        while self.ctx.state.is_running() {
            let cycle = self.cycle().await;
            trace!(target_addr = %self.target, outcome = cycle.outcome.as_label(), pause = ?cycle.pause, "cycle done");
            if !self.ctx.state.pause(cycle.pause).await {
                break;
            }
        }
        metrics::worker_stopped();
        debug!(target_addr = %self.target, "noise worker terminated");
    }

    /// Executes one cycle without sleeping.
    pub async fn cycle(&self) -> Cycle {
        let snapshot = self.ctx.state.snapshot_rate();

        if self.ctx.limits.is_protected(&self.target) {
            metrics::record_packet(PacketOutcome::Protected);
            return Cycle {
                outcome: PacketOutcome::Protected,
                pause: PROTECTED_PAUSE,
            };
        }

        // ThreadRng is not Send; it must be gone before the send below awaits.
        let (pause, payload, port) = {
            let mut rng = rand::rng();
            let pause = jittered_pause(&mut rng, snapshot.rate_per_minute);
            let payload = noise_payload(&mut rng);
            let port = pick_port(&mut rng, &self.ctx.limits.ports);
            (pause, payload, port)
        };
        let Some(port) = port else {
            // No candidate ports configured: nothing can be sent.
            return Cycle {
                outcome: PacketOutcome::Protected,
                pause: PROTECTED_PAUSE,
            };
        };

        let outcome = if snapshot.dry_run {
            self.ctx.events.emit(Event::DryRun {
                target: self.target.clone(),
                port,
                timestamp: Utc::now(),
            });
            PacketOutcome::DryRun
        } else {
            match self
                .ctx
                .sender
                .send(&self.target, port, payload.as_bytes())
                .await
            {
                Ok(()) => {
                    self.ctx.events.emit(Event::NoiseSent {
                        target: self.target.clone(),
                        port,
                        timestamp: Utc::now(),
                    });
                    PacketOutcome::Sent
                }
                Err(e) => {
                    debug!(target_addr = %self.target, port, error = %e, "send failed");
                    self.ctx.events.emit(Event::NoiseError {
                        target: self.target.clone(),
                        port,
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    PacketOutcome::Error
                }
            }
        };

        metrics::record_packet(outcome);
        Cycle { outcome, pause }
    }
}

impl std::fmt::Debug for NoiseWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseWorker")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

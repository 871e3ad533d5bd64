//! Adaptive traffic generation engine.
//!
//! The [`Engine`] is the supervisor: it owns the shared [`EngineState`],
//! the rate controller task, and a registry of noise worker tasks keyed by
//! target. Workers are never restarted and never aborted; shutdown is
//! cooperative through [`EngineState::stop`].

pub mod payload;
pub mod rate;
pub mod state;
pub mod worker;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

pub use state::{EngineState, RateSnapshot, RateUpdate, StatusSnapshot};
pub use worker::{Cycle, NoiseWorker, WorkerContext};

use crate::config::EngineLimits;
use crate::observability::events::{Event, EventLogger};
use crate::observability::metrics;
use crate::sender::PacketSender;

/// Options for constructing an [`Engine`].
pub struct EngineOptions {
    /// Initial targets.
    pub targets: Vec<String>,
    /// Record sends instead of transmitting.
    pub dry_run: bool,
    /// Pacing and policy parameters.
    pub limits: EngineLimits,
    /// Transmission capability.
    pub sender: Arc<dyn PacketSender>,
    /// Event sink.
    pub events: Arc<EventLogger>,
}

/// Engine supervisor.
pub struct Engine {
    ctx: WorkerContext,
    workers: Mutex<HashMap<String, JoinHandle<()>>>,
    controller: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Creates an engine; nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(opts: EngineOptions) -> Self {
        let state = Arc::new(EngineState::new(opts.targets, opts.dry_run, &opts.limits));
        Self {
            ctx: WorkerContext {
                state,
                sender: opts.sender,
                events: opts.events,
                limits: Arc::new(opts.limits),
            },
            workers: Mutex::new(HashMap::new()),
            controller: Mutex::new(None),
        }
    }

    /// Shared state handle, for the console and the dashboard.
    #[must_use]
    pub const fn state(&self) -> &Arc<EngineState> {
        &self.ctx.state
    }

    /// Logs `startup`, then spawns the rate controller and one worker per
    /// initial target. Must be called from within a Tokio runtime; a
    /// second call does nothing.
    pub fn start(&self) {
        let mut controller = lock(&self.controller);
        if controller.is_some() {
            return;
        }

        let targets = self.ctx.state.targets();
        let dry_run = self.ctx.state.is_dry_run();
        info!(targets = targets.len(), dry_run, "engine starting");
        self.ctx.events.emit(Event::Startup {
            targets: targets.clone(),
            dry_run,
            timestamp: Utc::now(),
        });
        metrics::set_targets(targets.len());

        *controller = Some(tokio::spawn(rate::run_rate_controller(
            Arc::clone(&self.ctx.state),
            Arc::clone(&self.ctx.events),
            self.ctx.limits.rate_check_interval,
        )));
        drop(controller);

        for target in targets {
            self.spawn_worker(&target);
        }
    }

    /// Adds a target and starts its worker. Returns `false` if the target
    /// was already in the set.
    ///
    /// If a worker for this identifier is still alive (the target was
    /// removed and re-added) no second worker is spawned.
    pub fn add_target(&self, target: &str) -> bool {
        if !self.ctx.state.add_target(target) {
            return false;
        }
        info!(target_addr = %target, "target added");
        self.ctx.events.emit(Event::TargetAdded {
            target: target.to_string(),
            timestamp: Utc::now(),
        });
        metrics::set_targets(self.ctx.state.targets().len());
        if self.ctx.state.is_running() {
            self.spawn_worker(target);
        }
        true
    }

    /// Removes a target from the set. Returns `false` for a non-member.
    ///
    /// The target's worker keeps running; removal only affects the set
    /// shown on the console and dashboard.
    pub fn remove_target(&self, target: &str) -> bool {
        if !self.ctx.state.remove_target(target) {
            return false;
        }
        info!(target_addr = %target, "target removed");
        self.ctx.events.emit(Event::TargetRemoved {
            target: target.to_string(),
            timestamp: Utc::now(),
        });
        metrics::set_targets(self.ctx.state.targets().len());
        true
    }

    /// Begins shutdown without waiting. Idempotent; only the first call
    /// logs a `shutdown` event.
    pub fn stop(&self, reason: &str) {
        if self.ctx.state.stop() {
            info!(reason, "engine stopping");
            self.ctx.events.emit(Event::Shutdown {
                reason: reason.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    /// Stops the engine and waits up to `grace` in total for its tasks to
    /// exit.
    ///
    /// All tasks share one deadline. Tasks that overrun are left to finish
    /// on their own.
    pub async fn shutdown(&self, reason: &str, grace: Duration) {
        self.stop(reason);
        let deadline = Instant::now() + grace;

        let mut handles: Vec<(String, JoinHandle<()>)> = lock(&self.workers).drain().collect();
        if let Some(controller) = lock(&self.controller).take() {
            handles.push(("rate-controller".to_string(), controller));
        }

        for (name, handle) in handles {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => warn!(task = %name, error = %e, "engine task panicked"),
                Err(_) => warn!(task = %name, ?grace, "engine task did not finish in time"),
            }
        }
    }

    /// Number of worker tasks that have not yet exited.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        lock(&self.workers)
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    fn spawn_worker(&self, target: &str) {
        let mut workers = lock(&self.workers);
        if workers.get(target).is_some_and(|h| !h.is_finished()) {
            return;
        }
        let worker = NoiseWorker::new(target, self.ctx.clone());
        workers.insert(target.to_string(), tokio::spawn(worker.run()));
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.ctx.state)
            .field("workers", &lock(&self.workers).len())
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

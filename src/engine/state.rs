//! Shared engine state.
//!
//! One mutex guards every field that must be read or changed together
//! (target set, rate, attack score, failure counters, running flag). The
//! lock is only ever held for a few arithmetic or collection operations and
//! never across an `.await`. A [`CancellationToken`] mirrors the running
//! flag so that sleeping tasks observe [`EngineState::stop`] at their next
//! suspension point.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::EngineLimits;

/// Consistent pair read by a worker at the top of each cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSnapshot {
    /// Per-target emission rate in packets per minute.
    pub rate_per_minute: f64,
    /// Whether sends are simulated.
    pub dry_run: bool,
}

/// Result of one rate controller tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateUpdate {
    /// Rate after rescaling.
    pub rate_per_minute: f64,
    /// Attack score after decay.
    pub attack_score: f64,
}

/// Point-in-time copy of every field, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    /// Targets in insertion order.
    pub targets: Vec<String>,
    /// Current rate.
    pub rate_per_min: f64,
    /// Current attack score.
    pub attack_score: f64,
    /// Failure counters in insertion order.
    pub failures: IndexMap<String, u64>,
    /// Whether the engine is still running.
    pub running: bool,
    /// Whether sends are simulated.
    pub dry_run: bool,
}

#[derive(Debug)]
struct Inner {
    targets: IndexSet<String>,
    rate_per_minute: f64,
    attack_score: f64,
    failures: IndexMap<String, u64>,
    running: bool,
}

/// The engine's single source of truth.
///
/// Created once per engine and shared as `Arc<EngineState>` with the rate
/// controller, every worker, the console and the dashboard.
pub struct EngineState {
    inner: Mutex<Inner>,
    dry_run: bool,
    base_rate: f64,
    max_rate: f64,
    adapt_multiplier: f64,
    shutdown: CancellationToken,
}

impl EngineState {
    /// Creates the state with the given initial targets.
    ///
    /// Duplicate targets are collapsed; the rate starts at the floor and
    /// the attack score at zero.
    #[must_use]
    pub fn new<I, S>(targets: I, dry_run: bool, limits: &EngineLimits) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: IndexSet<String> = targets.into_iter().map(Into::into).collect();
        let failures = targets.iter().map(|t| (t.clone(), 0)).collect();
        Self {
            inner: Mutex::new(Inner {
                targets,
                rate_per_minute: limits.base_rate,
                attack_score: 0.0,
                failures,
                running: true,
            }),
            dry_run,
            base_rate: limits.base_rate,
            max_rate: limits.max_rate,
            adapt_multiplier: limits.adapt_multiplier,
            shutdown: CancellationToken::new(),
        }
    }

    // A panic while holding the lock cannot leave Inner half-updated: every
    // critical section is straight-line arithmetic or a single collection op.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads rate and dry-run as one consistent pair.
    #[must_use]
    pub fn snapshot_rate(&self) -> RateSnapshot {
        let inner = self.lock();
        RateSnapshot {
            rate_per_minute: inner.rate_per_minute,
            dry_run: self.dry_run,
        }
    }

    /// Adds `target` to the set. Returns `false` if it was already present.
    pub fn add_target(&self, target: &str) -> bool {
        let mut inner = self.lock();
        if !inner.targets.insert(target.to_string()) {
            return false;
        }
        inner.failures.entry(target.to_string()).or_insert(0);
        true
    }

    /// Removes `target` from the set. Returns `false` for a non-member.
    ///
    /// The failure counter is kept so history stays visible.
    pub fn remove_target(&self, target: &str) -> bool {
        self.lock().targets.shift_remove(target)
    }

    /// Targets in insertion order.
    #[must_use]
    pub fn targets(&self) -> Vec<String> {
        self.lock().targets.iter().cloned().collect()
    }

    /// Decays the attack score and recomputes the rate from it.
    ///
    /// The multiplier uses the score as it was before this tick's decay.
    pub fn decay_and_rescale(&self) -> RateUpdate {
        let mut inner = self.lock();
        let score = inner.attack_score;
        let multiplier = 1.0 + self.adapt_multiplier.min(score / 5.0);
        inner.rate_per_minute = (self.base_rate * multiplier).clamp(self.base_rate, self.max_rate);
        inner.attack_score = (score - 1.0).max(0.0);
        RateUpdate {
            rate_per_minute: inner.rate_per_minute,
            attack_score: inner.attack_score,
        }
    }

    /// Raises the attack score by `amount`; returns the new score.
    ///
    /// Nothing inside the engine calls this. It is the entry point for an
    /// external detector reporting defensive activity. Negative and
    /// non-finite amounts are ignored.
    pub fn raise_attack_score(&self, amount: f64) -> f64 {
        let mut inner = self.lock();
        if amount.is_finite() && amount > 0.0 {
            inner.attack_score += amount;
        }
        inner.attack_score
    }

    /// Current attack score.
    #[must_use]
    pub fn attack_score(&self) -> f64 {
        self.lock().attack_score
    }

    /// Increments the failure counter for `target`; returns the new count.
    pub fn record_failure(&self, target: &str) -> u64 {
        let mut inner = self.lock();
        let counter = inner.failures.entry(target.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    /// Failure counters in insertion order.
    #[must_use]
    pub fn failures(&self) -> IndexMap<String, u64> {
        self.lock().failures.clone()
    }

    /// Whether the engine is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Whether sends are simulated.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Begins shutdown. Returns `true` only for the call that flipped the
    /// flag; later calls are no-ops.
    pub fn stop(&self) -> bool {
        let was_running = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.running, false)
        };
        self.shutdown.cancel();
        was_running
    }

    /// Sleeps for `duration` unless the engine stops first.
    ///
    /// Returns `true` if the full duration elapsed and the engine is still
    /// running.
    pub async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.shutdown.cancelled() => false,
            () = tokio::time::sleep(duration) => self.is_running(),
        }
    }

    /// Consistent copy of every field.
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        let inner = self.lock();
        StatusSnapshot {
            targets: inner.targets.iter().cloned().collect(),
            rate_per_min: inner.rate_per_minute,
            attack_score: inner.attack_score,
            failures: inner.failures.clone(),
            running: inner.running,
            dry_run: self.dry_run,
        }
    }
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("EngineState")
            .field("targets", &inner.targets.len())
            .field("rate_per_minute", &inner.rate_per_minute)
            .field("attack_score", &inner.attack_score)
            .field("running", &inner.running)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn state_with(targets: &[&str]) -> EngineState {
        EngineState::new(targets.iter().copied(), false, &EngineLimits::default())
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn new_state_starts_at_floor() {
        let state = state_with(&["10.1.0.1", "10.1.0.2", "10.1.0.1"]);
        let snap = state.snapshot_rate();
        assert!(approx(snap.rate_per_minute, 6.0));
        assert!(!snap.dry_run);
        assert!(approx(state.attack_score(), 0.0));
        assert!(state.is_running());
        assert_eq!(state.targets(), vec!["10.1.0.1", "10.1.0.2"]);
        assert_eq!(state.failures().get("10.1.0.1"), Some(&0));
    }

    #[test]
    fn add_target_is_idempotent() {
        let state = state_with(&[]);
        assert!(state.add_target("10.3.3.3"));
        assert!(!state.add_target("10.3.3.3"));
        assert_eq!(state.targets(), vec!["10.3.3.3"]);
    }

    #[test]
    fn remove_non_member_is_noop() {
        let state = state_with(&["10.4.4.4"]);
        assert!(!state.remove_target("10.9.9.9"));
        assert_eq!(state.targets(), vec!["10.4.4.4"]);
        assert!(state.remove_target("10.4.4.4"));
        assert!(state.targets().is_empty());
        assert!(!state.remove_target("10.4.4.4"));
    }

    #[test]
    fn remove_preserves_insertion_order() {
        let state = state_with(&["a", "b", "c"]);
        state.remove_target("b");
        state.add_target("d");
        assert_eq!(state.targets(), vec!["a", "c", "d"]);
    }

    #[test]
    fn score_25_gives_rate_36() {
        let state = state_with(&[]);
        state.raise_attack_score(25.0);
        let update = state.decay_and_rescale();
        assert!(approx(update.rate_per_minute, 36.0));
        assert!(approx(update.attack_score, 24.0));
    }

    #[test]
    fn huge_score_is_capped() {
        let state = state_with(&[]);
        state.raise_attack_score(5000.0);
        let update = state.decay_and_rescale();
        assert!(approx(update.rate_per_minute, 36.0));
        assert!(approx(update.attack_score, 4999.0));
    }

    #[test]
    fn zero_score_stays_at_floor() {
        let state = state_with(&[]);
        let update = state.decay_and_rescale();
        assert!(approx(update.rate_per_minute, 6.0));
        assert!(approx(update.attack_score, 0.0));
    }

    #[test]
    fn fractional_score_decays_to_zero_not_below() {
        let state = state_with(&[]);
        state.raise_attack_score(0.5);
        let update = state.decay_and_rescale();
        assert!(approx(update.rate_per_minute, 6.0 * 1.1));
        assert!(approx(update.attack_score, 0.0));
    }

    #[test]
    fn rate_is_clamped_to_ceiling() {
        let limits = EngineLimits {
            base_rate: 50.0,
            ..EngineLimits::default()
        };
        let state = EngineState::new(Vec::<String>::new(), false, &limits);
        state.raise_attack_score(100.0);
        let update = state.decay_and_rescale();
        assert!(approx(update.rate_per_minute, 200.0));
    }

    #[test]
    fn raise_ignores_negative_and_nan() {
        let state = state_with(&[]);
        state.raise_attack_score(3.0);
        assert!(approx(state.raise_attack_score(-10.0), 3.0));
        assert!(approx(state.raise_attack_score(f64::NAN), 3.0));
        assert!(approx(state.raise_attack_score(f64::INFINITY), 3.0));
    }

    #[test]
    fn record_failure_counts_per_target() {
        let state = state_with(&["10.5.5.5"]);
        assert_eq!(state.record_failure("10.5.5.5"), 1);
        assert_eq!(state.record_failure("10.5.5.5"), 2);
        assert_eq!(state.record_failure("10.6.6.6"), 1);
        let failures = state.failures();
        assert_eq!(failures.get("10.5.5.5"), Some(&2));
        assert_eq!(failures.get("10.6.6.6"), Some(&1));
    }

    #[test]
    fn stop_is_one_way_and_idempotent() {
        let state = state_with(&[]);
        assert!(state.stop());
        assert!(!state.stop());
        assert!(!state.is_running());
        assert!(!state.status().running);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_returns_false_once_stopped() {
        let state = Arc::new(state_with(&[]));
        assert!(state.pause(Duration::from_millis(10)).await);

        let sleeper = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.pause(Duration::from_secs(3600)).await })
        };
        tokio::task::yield_now().await;
        state.stop();
        assert!(!sleeper.await.unwrap());
    }

    #[test]
    fn status_snapshot_serializes() {
        let state = state_with(&["10.7.7.7"]);
        let json = serde_json::to_value(state.status()).unwrap();
        assert_eq!(json["targets"][0], "10.7.7.7");
        assert_eq!(json["rate_per_min"], 6.0);
        assert_eq!(json["failures"]["10.7.7.7"], 0);
        assert_eq!(json["running"], true);
    }

    #[test]
    fn concurrent_adds_keep_targets_unique() {
        let state = Arc::new(state_with(&[]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&state);
                thread::spawn(move || (0..50).filter(|i| s.add_target(&format!("t{i}"))).count())
            })
            .collect();
        let added: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(added, 50);
        assert_eq!(state.targets().len(), 50);
    }

    #[test]
    fn snapshots_are_never_torn_under_contention() {
        let state = Arc::new(state_with(&[]));
        state.raise_attack_score(1000.0);
        let writer = {
            let s = Arc::clone(&state);
            thread::spawn(move || {
                for _ in 0..2000 {
                    s.decay_and_rescale();
                    s.raise_attack_score(0.5);
                }
            })
        };
        for _ in 0..2000 {
            let status = state.status();
            assert!(status.rate_per_min >= 6.0 && status.rate_per_min <= 200.0);
            assert!(status.attack_score >= 0.0);
        }
        writer.join().unwrap();
    }

    proptest! {
        #[test]
        fn single_tick_matches_formula(score in 0.0f64..100_000.0) {
            let state = state_with(&[]);
            state.raise_attack_score(score);
            let update = state.decay_and_rescale();
            let expected_rate = (6.0 * (1.0 + (score / 5.0).min(5.0))).clamp(6.0, 200.0);
            prop_assert!((update.rate_per_minute - expected_rate).abs() < 1e-9);
            prop_assert!((update.attack_score - (score - 1.0).max(0.0)).abs() < 1e-6);
        }

        #[test]
        fn invariants_hold_over_any_tick_sequence(
            bumps in proptest::collection::vec(0.0f64..500.0, 0..64),
        ) {
            let state = state_with(&[]);
            for bump in bumps {
                state.raise_attack_score(bump);
                let update = state.decay_and_rescale();
                prop_assert!(update.rate_per_minute >= 6.0);
                prop_assert!(update.rate_per_minute <= 200.0);
                prop_assert!(update.attack_score >= 0.0);
            }
        }
    }
}

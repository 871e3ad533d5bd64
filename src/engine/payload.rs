//! Per-cycle randomness: pacing jitter, payload filler and port choice.
//!
//! All functions take the RNG explicitly so callers can keep a
//! non-`Send` thread RNG out of their `.await` points, and tests can use a
//! seeded one.

use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;
use rand_distr::StandardNormal;
use sha2::{Digest, Sha256};

use crate::config::MIN_PAUSE;

/// Length of every payload, in hex characters.
pub const PAYLOAD_LEN: usize = 64;

/// Relative standard deviation of the pacing jitter.
const JITTER: f64 = 0.3;

/// Mean time between two sends from one worker at `rate_per_minute`.
#[must_use]
pub fn mean_interval(rate_per_minute: f64) -> Duration {
    // The state keeps the rate at or above its floor; the guard only keeps
    // a misconfigured zero floor from dividing by zero.
    Duration::from_secs_f64(60.0 / rate_per_minute.max(0.1))
}

/// Draws a jittered pause around [`mean_interval`], never below 100 ms.
pub fn jittered_pause<R: Rng + ?Sized>(rng: &mut R, rate_per_minute: f64) -> Duration {
    let mean = mean_interval(rate_per_minute).as_secs_f64();
    let z: f64 = rng.sample(StandardNormal);
    let secs = JITTER.mul_add(mean * z, mean);
    Duration::from_secs_f64(secs.max(MIN_PAUSE.as_secs_f64()))
}

/// Builds a 64-character hex filler payload.
///
/// The digest input mixes the current Unix time with a random number in
/// `0..=9999`, so consecutive payloads look unrelated.
pub fn noise_payload<R: Rng + ?Sized>(rng: &mut R) -> String {
    let now = chrono::Utc::now();
    #[allow(clippy::cast_precision_loss)]
    let stamp = now.timestamp_micros() as f64 / 1_000_000.0;
    let nonce: u32 = rng.random_range(0..=9999);
    digest_payload(&format!("fog:{stamp}:{nonce}"))
}

/// Hex SHA-256 of `seed`, truncated to [`PAYLOAD_LEN`].
#[must_use]
pub fn digest_payload(seed: &str) -> String {
    let mut hex = hex::encode(Sha256::digest(seed.as_bytes()));
    hex.truncate(PAYLOAD_LEN);
    hex
}

/// Picks a destination port uniformly from `ports`.
///
/// Returns `None` only for an empty candidate list.
pub fn pick_port<R: Rng + ?Sized>(rng: &mut R, ports: &[u16]) -> Option<u16> {
    ports.choose(rng).copied()
}

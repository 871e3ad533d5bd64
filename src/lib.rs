//! `PhantomFog` - Adaptive noise traffic engine
//!
//! Emits low-volume decoy UDP traffic toward a set of targets, scaling
//! the emission rate with an externally raised attack score. Includes an
//! operator console, a read-only dashboard, and a JSON event log.

pub mod cli;
pub mod config;
pub mod console;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod observability;
pub mod sender;

#[cfg(test)]
mod testing;

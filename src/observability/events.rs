//! Structured event log for `PhantomFog`.
//!
//! Every engine decision is recorded as one JSON object per line, tagged
//! with `"type"` and stamped with a UTC timestamp and a monotonically
//! increasing sequence number. The same line is written to each configured
//! sink: normally an append-only file plus a console mirror.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted by the engine or the control surface.
///
/// Serialized with a snake_case `"type"` tag, e.g. `{"type":"noise_sent"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The engine has started.
    Startup {
        /// Initial target list.
        targets: Vec<String>,
        /// Whether transmission is simulated.
        dry_run: bool,
        /// When the engine started.
        timestamp: DateTime<Utc>,
    },

    /// The rate controller recomputed the emission rate.
    RateUpdate {
        /// New per-target rate.
        rate_per_min: f64,
        /// Attack score after decay.
        attack_score: f64,
        /// When the tick happened.
        timestamp: DateTime<Utc>,
    },

    /// A send was simulated.
    DryRun {
        /// Destination.
        target: String,
        /// Destination port.
        port: u16,
        /// When the send would have happened.
        timestamp: DateTime<Utc>,
    },

    /// A datagram was handed to the network stack.
    NoiseSent {
        /// Destination.
        target: String,
        /// Destination port.
        port: u16,
        /// When it was sent.
        timestamp: DateTime<Utc>,
    },

    /// A send failed.
    NoiseError {
        /// Destination.
        target: String,
        /// Destination port.
        port: u16,
        /// Failure detail.
        error: String,
        /// When the failure happened.
        timestamp: DateTime<Utc>,
    },

    /// A target joined the target set at runtime.
    TargetAdded {
        /// The new target.
        target: String,
        /// When it was added.
        timestamp: DateTime<Utc>,
    },

    /// A target left the target set at runtime.
    TargetRemoved {
        /// The removed target.
        target: String,
        /// When it was removed.
        timestamp: DateTime<Utc>,
    },

    /// The engine was told to stop.
    Shutdown {
        /// What asked for the stop (e.g. `"console"`, `"signal"`).
        reason: String,
        /// When the stop was requested.
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// The serialized `"type"` tag of this event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Startup { .. } => "startup",
            Self::RateUpdate { .. } => "rate_update",
            Self::DryRun { .. } => "dry_run",
            Self::NoiseSent { .. } => "noise_sent",
            Self::NoiseError { .. } => "noise_error",
            Self::TargetAdded { .. } => "target_added",
            Self::TargetRemoved { .. } => "target_removed",
            Self::Shutdown { .. } => "shutdown",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

type Sink = BufWriter<Box<dyn Write + Send>>;

/// Thread-safe, buffered JSONL event writer with any number of sinks.
///
/// Each call to [`emit`](Self::emit) takes the next sequence number,
/// serializes the event once, and writes and flushes the line to every
/// sink. Serialization and I/O failures are dropped: a full disk or a
/// closed console must never stop traffic generation.
pub struct EventLogger {
    sinks: Mutex<Vec<Sink>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug.
impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventLogger {
    /// Creates a logger writing to each of `sinks`.
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn Write + Send>>) -> Self {
        Self {
            sinks: Mutex::new(sinks.into_iter().map(BufWriter::new).collect()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates a logger appending to the file at `path`, optionally
    /// mirroring to stdout.
    ///
    /// If the file cannot be opened the logger falls back to the console
    /// mirror alone; the failure is reported through `tracing` only.
    #[must_use]
    pub fn open(path: &Path, echo: bool) -> Self {
        let mut sinks: Vec<Box<dyn Write + Send>> = Vec::with_capacity(2);
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => sinks.push(Box::new(file)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "event log unavailable");
            }
        }
        if echo {
            sinks.push(Box::new(std::io::stdout()));
        }
        Self::new(sinks)
    }

    /// Emits an event as a single JSONL line on every sink.
    ///
    /// Sequence numbers are assigned under the sink lock, so lines appear
    /// in sequence order.
    pub fn emit(&self, event: Event) {
        let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(sequence = seq, kind = event.kind(), "event");
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };
        let Ok(line) = serde_json::to_string(&envelope) else {
            return;
        };

        for sink in sinks.iter_mut() {
            let _ = writeln!(sink, "{line}");
            let _ = sink.flush();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

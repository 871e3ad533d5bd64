//! Observability module
//!
//! Diagnostic logging, Prometheus metrics, and the structured event log
//! that records every engine decision.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventLogger};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;

//! Rate controller: the periodic decay-and-rescale loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::engine::state::EngineState;
use crate::observability::events::{Event, EventLogger};
use crate::observability::metrics;

/// Ticks every `period` until the engine stops.
///
/// Each tick decays the attack score, rescales the rate and records a
/// `rate_update` event. The first tick happens immediately.
pub async fn run_rate_controller(
    state: Arc<EngineState>,
    events: Arc<EventLogger>,
    period: Duration,
) {
    debug!(?period, "rate controller started");
    while state.is_running() {
        let update = state.decay_and_rescale();
        metrics::set_rate(update.rate_per_minute, update.attack_score);
        events.emit(Event::RateUpdate {
            rate_per_min: update.rate_per_minute,
            attack_score: update.attack_score,
            timestamp: Utc::now(),
        });
        if !state.pause(period).await {
            break;
        }
    }
    debug!("rate controller stopped");
}

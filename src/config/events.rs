//! Event pipeline sizing

use serde::{Deserialize, Serialize};

/// Capacities of the in-memory buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast buffer per subscriber before it starts lagging
    pub bus_capacity: usize,
    /// Recorded events kept for `recent_events`
    pub event_log_capacity: usize,
    /// Distribution decisions kept for inspection
    pub decision_log_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            event_log_capacity: 10_000,
            decision_log_capacity: 1000,
        }
    }
}

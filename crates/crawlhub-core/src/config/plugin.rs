//! Plugin system configuration.

use serde::{Deserialize, Serialize};

/// Plugin system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Per-handler time budget for one dispatch cycle, in seconds. A handler
    /// still running when the budget elapses is treated as faulted for that
    /// cycle and its write intents are discarded.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_seconds: u64,
    /// Capacity of the inbound event queue consumed by the event pump.
    #[serde(default = "default_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            handler_timeout_seconds: default_handler_timeout(),
            event_queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_handler_timeout() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    256
}

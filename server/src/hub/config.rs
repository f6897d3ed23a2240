use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Broadcast hub tuning.
/// Exposed in `eventhub.toml` under the `[hub]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Events buffered for a subscriber that is momentarily behind.
    /// A subscriber that falls further behind than this is disconnected.
    /// Default: 1024
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Longest a single outbound send may take before the subscriber is
    /// considered stalled and disconnected.
    /// Default: 5000 ms
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl HubConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

fn default_buffer_capacity() -> usize {
    1024
}

fn default_send_timeout_ms() -> u64 {
    5000
}

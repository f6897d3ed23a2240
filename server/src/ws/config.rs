use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-connection WebSocket settings.
/// Exposed in `eventhub.toml` under the `[ws]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Frames queued between the hub's forwarding task and the socket writer.
    /// Default: 64
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Interval between server pings, in seconds.
    /// Default: 30
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// How long to wait for a pong after each ping, in seconds.
    /// Default: 10
    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,
}

impl WsConfig {
    /// Never zero; a zero tokio interval panics.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
            ping_interval_secs: default_ping_interval_secs(),
            pong_timeout_secs: default_pong_timeout_secs(),
        }
    }
}

fn default_outbound_queue() -> usize {
    64
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_pong_timeout_secs() -> u64 {
    10
}

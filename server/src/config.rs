use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::hub::HubConfig;
use crate::ws::config::WsConfig;

/// eventhub: real-time event fan-out server
///
/// Flags are optional overrides. An unset flag leaves the TOML/env value alone.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "eventhub-server", version, about = "Real-time event fan-out server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, env = "EVENTHUB_CONFIG", default_value = "./eventhub.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,

    pub bind_address: String,

    #[serde(default)]
    pub json_logs: bool,

    #[serde(default)]
    pub generate_config: bool,

    /// Broadcast hub tuning (loaded from [hub] section in TOML)
    #[serde(default)]
    pub hub: HubConfig,

    /// WebSocket connection tuning (loaded from [ws] section in TOML)
    #[serde(default)]
    pub ws: WsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            generate_config: false,
            hub: HubConfig::default(),
            ws: WsConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (EVENTHUB_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Cli::parse();
        Self::figment(&cli).extract()
    }

    /// Nested keys use a double underscore in env vars,
    /// e.g. `EVENTHUB_HUB__BUFFER_CAPACITY=4096`.
    pub fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("EVENTHUB_").split("__"))
            .merge(Serialized::defaults(cli))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# eventhub Server Configuration
# Place this file at ./eventhub.toml or specify with --config <path>
# All settings can be overridden via environment variables (EVENTHUB_PORT,
# EVENTHUB_HUB__BUFFER_CAPACITY, etc.) or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# ---- Broadcast Hub ----
# [hub]

# Events buffered per subscriber before a lagging subscriber is disconnected
# buffer_capacity = 1024

# Max time in milliseconds a single frame send may take before the
# subscriber is considered stalled and disconnected
# send_timeout_ms = 5000

# ---- WebSocket Connections ----
# [ws]

# Outbound frames queued per connection between the hub and the socket writer
# outbound_queue = 64

# Seconds between server pings
# ping_interval_secs = 30

# Seconds to wait for a pong before closing the connection
# pong_timeout_secs = 10
"#
    .to_string()
}

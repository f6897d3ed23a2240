use crate::hub::BroadcastHub;
use crate::ws::WsConfig;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// The single broadcast hub for this process
    pub hub: BroadcastHub,
    /// Per-connection WebSocket settings
    pub ws: WsConfig,
}

impl AppState {
    pub fn new(hub: BroadcastHub, ws: WsConfig) -> Self {
        Self { hub, ws }
    }
}

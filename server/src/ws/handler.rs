use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws/events
/// WebSocket upgrade endpoint. Every accepted connection gets a fresh session
/// id and becomes a hub subscriber until it disconnects.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.hub.is_closed() {
        return (StatusCode::SERVICE_UNAVAILABLE, "hub is shut down").into_response();
    }

    let session_id = Uuid::new_v4().to_string();
    tracing::debug!(session_id = %session_id, "WebSocket upgrade accepted");

    ws.on_upgrade(move |socket| actor::run_connection(socket, state, session_id))
}

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::health;
use crate::publish;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Producer ingress
        .route("/events", post(publish::publish_event))
        // Subscriber ingress (WebSocket upgrade)
        .route("/ws/events", get(ws_handler::ws_upgrade))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health: liveness plus the current subscriber count.
/// 503 once the hub has been shut down.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let subscribers = state.hub.subscriber_count();
    if state.hub.is_closed() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "closed", "subscribers": subscribers })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({ "status": "ok", "subscribers": subscribers })),
        )
    }
}

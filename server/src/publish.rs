use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use crate::error::ApiError;
use crate::hub::Event;
use crate::state::AppState;

/// POST /events: publish an event to every connected subscriber.
/// Returns 202 Accepted with an empty body. A payload that does not decode to
/// an Event is rejected here and never reaches the hub.
pub async fn publish_event(
    State(state): State<AppState>,
    payload: Result<Json<Event>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(event) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Rejected event payload");
        ApiError::Decode(rejection)
    })?;

    let subscribers = state.hub.publish(event).map_err(|_| ApiError::HubClosed)?;
    tracing::debug!(subscribers, "Event accepted");

    Ok(StatusCode::ACCEPTED)
}

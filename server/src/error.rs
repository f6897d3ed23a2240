use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failures reported by the broadcast hub itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("session {0} is already subscribed")]
    DuplicateSession(String),
    #[error("hub is shut down")]
    Closed,
}

/// Failures reported by an outbound sink when delivering a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("connection closed")]
    Closed,
}

/// Errors surfaced by the HTTP ingress.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid event payload: {0}")]
    Decode(#[from] JsonRejection),
    #[error("hub is shut down")]
    HubClosed,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            // 400 for bad syntax, 422 for wrong shape, 415 for missing content type
            ApiError::Decode(rejection) => rejection.status(),
            ApiError::HubClosed => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

//! Event model and its JSON wire encoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A unit of data published to every connected subscriber.
///
/// `message` is the only required field. `eventDate` is optional, and any
/// other top-level fields are kept as-is so producers can attach structured
/// payloads without the hub knowing their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub message: String,

    #[serde(
        rename = "eventDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub event_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Build a plain text event with no date and no extra fields.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            event_date: None,
            extra: Map::new(),
        }
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.event_date = Some(date);
        self
    }
}

/// Encode an event as a JSON text frame.
///
/// Cannot fail for events built from JSON: every field is a string, a
/// timestamp or a `serde_json::Value`. Sinks with their own wire format
/// override [`OutboundSink::encode`](super::OutboundSink::encode).
pub fn encode(event: &Event) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

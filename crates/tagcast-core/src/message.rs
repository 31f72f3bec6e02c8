//! Invalidation messages and the JSON envelope they travel in.
//!
//! Every server → client frame is a text frame holding an [`Envelope`]:
//!
//! ```json
//! {"type": "invalidate", "timestamp": "2026-01-01T00:00:00Z",
//!  "data": {"tags": [{"type": "Hero", "id": "LIST"}], "message": "updated"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CoreError;
use crate::ids::ClientId;
use crate::tag::Tag;

/// Event type sent once when a session is accepted.
pub const EVENT_CONNECTION_ESTABLISHED: &str = "connection.established";
/// Event type carrying an [`InvalidationMessage`].
pub const EVENT_INVALIDATE: &str = "invalidate";

/// Tags to invalidate plus an optional user-facing status line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    /// Tags whose cached queries become stale. Usually non-empty.
    pub tags: Vec<Tag>,
    /// Toast text, shown at most once per debounce window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InvalidationMessage {
    /// Build a message from tags and optional toast text.
    pub fn new(tags: Vec<Tag>, message: Option<String>) -> Self {
        Self { tags, message }
    }

    /// Toast text, if present and non-empty.
    pub fn toast(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

/// Wire frame shared by all server events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event type string.
    #[serde(rename = "type")]
    pub event_type: String,
    /// RFC 3339 send time.
    pub timestamp: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    fn stamped(event_type: &str, data: Value) -> Self {
        Self {
            event_type: event_type.to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Envelope for an invalidation broadcast.
    pub fn invalidate(message: &InvalidationMessage) -> Result<Self, CoreError> {
        let data = serde_json::to_value(message).map_err(CoreError::Encode)?;
        Ok(Self::stamped(EVENT_INVALIDATE, data))
    }

    /// Greeting sent to a freshly connected session.
    pub fn connection_established(client_id: &ClientId) -> Self {
        Self::stamped(
            EVENT_CONNECTION_ESTABLISHED,
            serde_json::json!({ "clientId": client_id }),
        )
    }

    /// Serialize to the text frame payload.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(CoreError::Encode)
    }

    /// Parse a text frame.
    pub fn decode(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(CoreError::Decode)
    }

    /// Interpret the payload according to the event type.
    pub fn into_event(self) -> Result<ServerEvent, CoreError> {
        match self.event_type.as_str() {
            EVENT_INVALIDATE => serde_json::from_value(self.data)
                .map(ServerEvent::Invalidate)
                .map_err(|source| CoreError::Payload {
                    event_type: EVENT_INVALIDATE.to_owned(),
                    source,
                }),
            EVENT_CONNECTION_ESTABLISHED => {
                let client_id = self
                    .data
                    .get("clientId")
                    .and_then(Value::as_str)
                    .map(ClientId::from);
                Ok(ServerEvent::ConnectionEstablished { client_id })
            }
            _ => Ok(ServerEvent::Unknown(self.event_type)),
        }
    }
}

/// Decoded server → client event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    /// Session accepted; carries the server-assigned id when present.
    ConnectionEstablished {
        /// Server-assigned client id.
        client_id: Option<ClientId>,
    },
    /// Cached queries matching these tags are stale.
    Invalidate(InvalidationMessage),
    /// Any other event type. Ignored by subscribers.
    Unknown(String),
}

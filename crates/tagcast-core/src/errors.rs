//! Error types for envelope encoding and decoding.

use thiserror::Error;

/// Errors raised while moving events on and off the wire.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The frame could not be serialized.
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),
    /// The frame was not a valid envelope.
    #[error("failed to decode envelope: {0}")]
    Decode(#[source] serde_json::Error),
    /// The envelope was valid but its payload did not match the event type.
    #[error("invalid payload for `{event_type}`: {source}")]
    Payload {
        /// Event type whose payload was rejected.
        event_type: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

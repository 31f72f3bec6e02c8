//! # tagcast-core
//!
//! Shared vocabulary for the tagcast invalidation layer.
//!
//! - **Tags**: [`Tag`] `(type, id)` pairs, with the `LIST` sentinel convention
//! - **Messages**: [`InvalidationMessage`] and the wire [`Envelope`]
//! - **IDs**: [`ClientId`] for connected sessions (UUID v7)
//! - **Errors**: [`CoreError`] for envelope decoding
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod message;
pub mod tag;

pub use errors::CoreError;
pub use ids::ClientId;
pub use message::{Envelope, InvalidationMessage, ServerEvent};
pub use tag::{LIST, Tag};

//! # tagcast-server
//!
//! Server half of the invalidation layer.
//!
//! - [`ConnectionRegistry`]: lazily attaches at most one [`LiveServer`] per process
//! - [`LiveServer`]: Axum WebSocket endpoint at `/ws` plus `/health`
//! - [`broadcast`]: fire-and-forget fan-out of an invalidation to every session
//! - [`with_invalidation`]: wraps write handlers so a 2xx result broadcasts
//! - [`site::bootstrap_router`]: `GET /api/socket`, the lazy-attach trigger

#![deny(unsafe_code)]

pub mod adapter;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod site;
pub mod websocket;

pub use adapter::{Invalidating, Invalidation, MutationOutcome, WriteHandler, with_invalidation};
pub use config::{ServerConfig, WS_PATH};
pub use errors::ServerError;
pub use registry::{Broadcaster, ConnectionRegistry, broadcast};
pub use server::LiveServer;

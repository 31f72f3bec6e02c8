//! WebSocket sessions, per-client state, and fan-out.

pub mod broadcast;
pub mod connection;
pub mod session;

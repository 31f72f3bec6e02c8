//! # tagcast-client
//!
//! Subscriber half of the invalidation layer.
//!
//! - [`Subscriber`]: reconnecting WebSocket task with observable state
//! - [`QueryCache`] / [`MemoryQueryCache`]: tag-driven stale marking
//! - [`Notifier`] / [`ToastDebouncer`]: at most one toast per window
//! - [`InvalidationListener`]: frame handling that never takes the connection down

#![deny(unsafe_code)]

pub mod backoff;
pub mod cache;
pub mod errors;
pub mod listener;
pub mod notify;
pub mod subscriber;

pub use cache::{MemoryQueryCache, QueryCache};
pub use errors::ClientError;
pub use listener::InvalidationListener;
pub use notify::{LogNotifier, Notifier, ToastDebouncer};
pub use subscriber::{Subscriber, SubscriberConfig, SubscriberHandle, SubscriberState};

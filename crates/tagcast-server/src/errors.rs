//! Server error types.

use thiserror::Error;

/// Errors from attaching the real-time server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound to the requested address.
    #[error("failed to bind real-time server to {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The bound listener could not report its address.
    #[error("failed to read bound address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

//! Subscriber error types.

use thiserror::Error;

/// Errors raised while connecting or bootstrapping.
///
/// Frame handling errors never surface here; they are logged and dropped.
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket connect or transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Bootstrap request failed.
    #[error("bootstrap request to {url} failed: {source}")]
    Bootstrap {
        /// Bootstrap URL.
        url: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

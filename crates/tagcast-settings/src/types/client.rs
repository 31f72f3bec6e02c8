//! Subscriber settings.

use serde::{Deserialize, Serialize};

/// Defaults for the client-side subscriber.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// WebSocket URL of the real-time server.
    pub url: String,
    /// Site route that lazily starts the real-time server before connecting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_url: Option<String>,
    /// Minimum gap between two shown toasts in milliseconds.
    pub toast_debounce_ms: u64,
    /// First reconnect delay in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay cap in milliseconds.
    pub reconnect_max_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3001/ws".to_string(),
            bootstrap_url: Some("http://127.0.0.1:3000/api/socket".to_string()),
            toast_debounce_ms: 1000,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 5000,
        }
    }
}

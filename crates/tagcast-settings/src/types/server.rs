//! Site and real-time server settings.

use serde::{Deserialize, Serialize};

/// Site HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl SiteSettings {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Real-time WebSocket server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Interval between server Ping frames in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a session whose last Pong is older than this, in milliseconds.
    pub pong_timeout_ms: u64,
    /// Per-session outbound queue capacity.
    pub send_buffer: usize,
    /// Total dropped frames after which a slow session is evicted.
    pub max_drops: u64,
    /// Largest accepted inbound frame in bytes.
    pub max_message_size: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            heartbeat_interval_ms: 30_000,
            pong_timeout_ms: 60_000,
            send_buffer: 256,
            max_drops: 100,
            max_message_size: 64 * 1024,
        }
    }
}

impl RealtimeSettings {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

//! Real-time server configuration.

use std::time::Duration;

use tagcast_settings::RealtimeSettings;

/// Stable WebSocket path. Reconnecting clients must always find the same
/// live server here.
pub const WS_PATH: &str = "/ws";

/// Runtime knobs for the live real-time server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Interval between server Pings.
    pub heartbeat_interval: Duration,
    /// Close a session whose last Pong is older than this.
    pub pong_timeout: Duration,
    /// Per-session outbound queue capacity.
    pub send_buffer: usize,
    /// Lifetime drop count that evicts a slow session.
    pub max_drops: u64,
    /// Largest accepted inbound frame in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&RealtimeSettings::default())
    }
}

impl From<&RealtimeSettings> for ServerConfig {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms.max(1)),
            pong_timeout: Duration::from_millis(settings.pong_timeout_ms),
            send_buffer: settings.send_buffer.max(1),
            max_drops: settings.max_drops.max(1),
            max_message_size: settings.max_message_size,
        }
    }
}

//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may name only the fields it wants to change.

mod client;
mod server;

pub use client::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "site": { "port": 3000 },
///   "realtime": { "port": 3001, "heartbeatIntervalMs": 15000 },
///   "client": { "toastDebounceMs": 1000 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagcastSettings {
    /// Site HTTP server (bootstrap and write routes).
    pub site: SiteSettings,
    /// Real-time WebSocket server.
    pub realtime: RealtimeSettings,
    /// Subscriber defaults.
    pub client: ClientSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`..`error`). `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

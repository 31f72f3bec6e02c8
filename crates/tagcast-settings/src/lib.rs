//! # tagcast-settings
//!
//! Layered configuration for the site server, the real-time server, and
//! subscribers.
//!
//! Settings are resolved in three layers (later wins):
//! 1. **Compiled defaults**: [`TagcastSettings::default()`]
//! 2. **User file**: `~/.tagcast/settings.json`, deep-merged over defaults
//! 3. **Environment**: `TAGCAST_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<TagcastSettings> = OnceLock::new();

/// Process-wide settings, loaded on first access.
///
/// Falls back to compiled defaults when loading fails.
pub fn get_settings() -> &'static TagcastSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            TagcastSettings::default()
        })
    })
}

/// Seed the process-wide settings before first access.
///
/// Returns the value back if settings were already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: TagcastSettings) -> std::result::Result<(), TagcastSettings> {
    SETTINGS.set(settings)
}

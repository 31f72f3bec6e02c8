//! Settings loading: defaults, then the settings file, then `TAGCAST_*` env.
//!
//! Merge rules for the settings file:
//! - objects merge per key, recursively
//! - arrays and scalars replace the default
//! - `null` leaves the default in place

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::TagcastSettings;

/// `~/.tagcast/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tagcast").join("settings.json")
}

/// Load settings from the default path with env overrides.
pub fn load_settings() -> Result<TagcastSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env overrides.
///
/// A missing file yields defaults. Unreadable or malformed files are errors.
pub fn load_settings_from_path(path: &Path) -> Result<TagcastSettings> {
    let defaults = serde_json::to_value(TagcastSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "no settings file, using defaults");
        defaults
    };

    let mut settings: TagcastSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// Recursively merge `source` over `target`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `TAGCAST_*` overrides read through `lookup`.
///
/// Invalid values are logged and ignored. An empty `TAGCAST_BOOTSTRAP_URL`
/// disables the bootstrap request.
pub fn apply_env_overrides<F>(settings: &mut TagcastSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.string("TAGCAST_SITE_HOST") {
        settings.site.host = v;
    }
    if let Some(v) = env.ranged("TAGCAST_SITE_PORT", 1u16, u16::MAX) {
        settings.site.port = v;
    }

    if let Some(v) = env.string("TAGCAST_REALTIME_HOST") {
        settings.realtime.host = v;
    }
    if let Some(v) = env.ranged("TAGCAST_REALTIME_PORT", 0u16, u16::MAX) {
        settings.realtime.port = v;
    }
    if let Some(v) = env.ranged("TAGCAST_HEARTBEAT_INTERVAL_MS", 1000u64, 600_000) {
        settings.realtime.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.ranged("TAGCAST_PONG_TIMEOUT_MS", 1000u64, 3_600_000) {
        settings.realtime.pong_timeout_ms = v;
    }
    if let Some(v) = env.ranged("TAGCAST_SEND_BUFFER", 1usize, 65_536) {
        settings.realtime.send_buffer = v;
    }

    if let Some(v) = env.string("TAGCAST_CLIENT_URL") {
        settings.client.url = v;
    }
    if let Some(v) = (env.lookup)("TAGCAST_BOOTSTRAP_URL") {
        settings.client.bootstrap_url = (!v.is_empty()).then_some(v);
    }
    if let Some(v) = env.ranged("TAGCAST_TOAST_DEBOUNCE_MS", 0u64, 60_000) {
        settings.client.toast_debounce_ms = v;
    }

    if let Some(v) = env.string("TAGCAST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.flag("TAGCAST_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Parse `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`, case-insensitive.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a number and keep it only when inside `min..=max`.
pub fn parse_in_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str) -> Option<bool> {
        let val = (self.lookup)(key)?;
        let parsed = parse_bool(&val);
        if parsed.is_none() {
            warn!(key, value = %val, "invalid boolean env var, ignoring");
        }
        parsed
    }

    fn ranged<T>(&self, key: &str, min: T, max: T) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd,
    {
        let val = (self.lookup)(key)?;
        let parsed = parse_in_range(&val, min, max);
        if parsed.is_none() {
            warn!(key, value = %val, "out-of-range env var, ignoring");
        }
        parsed
    }
}

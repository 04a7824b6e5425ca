//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`Settings::default()`]
//! 2. If a settings file was given, deep-merge its values over the defaults
//! 3. Apply `TICTAC_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde_json::Value;
use tictac_core::BoardVariant;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{LogFormat, Settings};

/// Load settings from the process environment and an optional JSON file.
///
/// A missing file is an error when a path is given explicitly.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Load settings using `lookup` in place of the process environment.
pub fn load_settings_with<F>(path: Option<&Path>, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match path {
        Some(path) => load_settings_from_path(path)?,
        None => Settings::default(),
    };
    apply_env_overrides(&mut settings, lookup);
    validate(&settings)?;
    Ok(settings)
}

/// Deep-merge the JSON file at `path` over the compiled defaults.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    debug!(?path, "loading settings from file");
    let defaults = serde_json::to_value(Settings::default())?;
    let content = std::fs::read_to_string(path)?;
    let user: Value = serde_json::from_str(&content)?;
    Ok(serde_json::from_value(deep_merge(defaults, user))?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `TICTAC_*` overrides read through `lookup`.
///
/// Integers must parse and fall within range; invalid values are logged and
/// ignored, leaving the file/default value in place.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("TICTAC_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("TICTAC_PORT", 0, u16::MAX) {
        settings.server.port = v;
    }
    if let Some(v) = env.usize("TICTAC_MAX_MESSAGE_SIZE", 16, 1 << 20) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = env.usize("TICTAC_SEND_QUEUE", 1, 65_536) {
        settings.server.send_queue_capacity = v;
    }
    if let Some(v) = env.u64("TICTAC_PING_INTERVAL_SECS", 1, 3600) {
        settings.server.ping_interval_secs = v;
    }
    if let Some(v) = env.u64("TICTAC_PONG_TIMEOUT_SECS", 1, 3600) {
        settings.server.pong_timeout_secs = v;
    }
    if let Some(v) = env.u64("TICTAC_WRITE_TIMEOUT_SECS", 1, 600) {
        settings.server.write_timeout_secs = v;
    }

    // ── Hub ─────────────────────────────────────────────────────────
    if let Some(v) = env.usize("TICTAC_EVENT_QUEUE", 1, 1 << 20) {
        settings.hub.event_queue_capacity = v;
    }
    if let Some(v) = env.usize("TICTAC_MAX_ROOMS", 1, 10_000) {
        settings.hub.max_rooms_per_connection = v;
    }
    if let Some(v) = env.parsed::<BoardVariant>("TICTAC_BOARD") {
        settings.hub.board = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TICTAC_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.parsed::<LogFormat>("TICTAC_LOG_FORMAT") {
        settings.logging.format = v;
    }
}

/// Reject settings the server cannot run with.
pub fn validate(settings: &Settings) -> Result<()> {
    let server = &settings.server;
    let hub = &settings.hub;
    let zero_limits = [
        ("server.sendQueueCapacity", server.send_queue_capacity == 0),
        ("server.maxMessageSize", server.max_message_size == 0),
        ("server.writeTimeoutSecs", server.write_timeout_secs == 0),
        ("server.pingIntervalSecs", server.ping_interval_secs == 0),
        ("hub.eventQueueCapacity", hub.event_queue_capacity == 0),
        ("hub.maxRoomsPerConnection", hub.max_rooms_per_connection == 0),
        ("hub.maxNameLen", hub.max_name_len == 0),
    ];
    if let Some((field, _)) = zero_limits.into_iter().find(|(_, zero)| *zero) {
        return Err(SettingsError::ZeroLimit(field));
    }
    if server.ping_interval_secs >= server.pong_timeout_secs {
        return Err(SettingsError::KeepaliveOrder {
            ping_secs: server.ping_interval_secs,
            pong_secs: server.pong_timeout_secs,
        });
    }
    Ok(())
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn checked<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.checked(name, |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.checked(name, |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.checked(name, |v| parse_usize_range(v, min, max))
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.checked(name, |v| v.parse().ok())
    }
}

//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may be partial; missing fields keep their compiled default.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tictac_core::BoardVariant;

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000, "pingIntervalSecs": 20, "pongTimeoutSecs": 30 },
///   "hub": { "board": "meta" },
///   "logging": { "format": "json", "modules": { "tower_http": "debug" } }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Listener and per-connection transport settings.
    pub server: ServerSettings,
    /// Session hub settings.
    pub hub: HubSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Listener and per-connection transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` binds an ephemeral port.
    pub port: u16,
    /// Largest inbound WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before it is evicted.
    pub send_queue_capacity: usize,
    /// Seconds between keepalive pings.
    pub ping_interval_secs: u64,
    /// Seconds of peer silence before the connection is closed.
    pub pong_timeout_secs: u64,
    /// Upper bound on a single transport write, in seconds.
    pub write_timeout_secs: u64,
}

impl ServerSettings {
    /// [`ping_interval_secs`](Self::ping_interval_secs) as a `Duration`.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Pong timeout as a `Duration`.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    /// Write timeout as a `Duration`.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_message_size: 512,
            send_queue_capacity: 256,
            ping_interval_secs: 54,
            pong_timeout_secs: 60,
            write_timeout_secs: 10,
        }
    }
}

/// Session hub settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Capacity of the hub's event channel.
    pub event_queue_capacity: usize,
    /// Rooms one connection may belong to at once.
    pub max_rooms_per_connection: usize,
    /// Board variant for newly created rooms.
    pub board: BoardVariant,
    /// Prefix for generated display names (`Guest1`, `Guest2`, …).
    pub guest_name_prefix: String,
    /// Longest accepted display name, in characters.
    pub max_name_len: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            event_queue_capacity: 1024,
            max_rooms_per_connection: 50,
            board: BoardVariant::Classic,
            guest_name_prefix: "Guest".to_string(),
            max_name_len: 24,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level directive (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Per-target level overrides, e.g. `{"tower_http": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            modules: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 8080);
        assert_eq!(s.max_message_size, 512);
        assert_eq!(s.send_queue_capacity, 256);
        assert_eq!(s.ping_interval(), Duration::from_secs(54));
        assert_eq!(s.pong_timeout(), Duration::from_secs(60));
        assert_eq!(s.write_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn hub_defaults() {
        let h = HubSettings::default();
        assert_eq!(h.event_queue_capacity, 1024);
        assert_eq!(h.max_rooms_per_connection, 50);
        assert_eq!(h.board, BoardVariant::Classic);
        assert_eq!(h.guest_name_prefix, "Guest");
        assert_eq!(h.max_name_len, 24);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["server"]["sendQueueCapacity"], 256);
        assert_eq!(json["hub"]["maxRoomsPerConnection"], 50);
        assert_eq!(json["hub"]["board"], "classic");
        assert_eq!(json["logging"]["format"], "pretty");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: Settings = serde_json::from_str(r#"{"hub": {"board": "meta"}}"#).unwrap();
        assert_eq!(s.hub.board, BoardVariant::Meta);
        assert_eq!(s.hub.max_rooms_per_connection, 50);
        assert_eq!(s.server, ServerSettings::default());
    }

    #[test]
    fn log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}

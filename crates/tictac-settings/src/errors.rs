//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read the settings file from disk.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the settings file.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A queue size, limit or timeout that must be positive was zero.
    #[error("invalid settings: {0} must be at least 1")]
    ZeroLimit(&'static str),
    /// Pings would not arrive before the peer is declared dead.
    #[error(
        "invalid settings: server.pingIntervalSecs ({ping_secs}) must be less than server.pongTimeoutSecs ({pong_secs})"
    )]
    KeepaliveOrder {
        /// Configured ping interval.
        ping_secs: u64,
        /// Configured pong timeout.
        pong_secs: u64,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

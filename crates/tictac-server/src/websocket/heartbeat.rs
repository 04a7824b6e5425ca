//! Ping/pong liveness monitoring.
//!
//! The writer owns the socket's sending half, so it also sends the pings:
//! at every [`Keepalive::ticker`] tick it asks [`Keepalive::check`] whether
//! to ping or give up on the peer.

use std::time::Duration;

use tictac_settings::ServerSettings;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::connection::Liveness;

/// What the writer should do at a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Send a Ping frame.
    Ping,
    /// Nothing was heard from the peer within the pong timeout.
    TimedOut,
}

/// Heartbeat timing for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    /// Time between pings.
    pub ping_interval: Duration,
    /// Silence after which the peer is dropped.
    pub pong_timeout: Duration,
}

impl Keepalive {
    /// Timing from the `server` settings section.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            ping_interval: settings.ping_interval(),
            pong_timeout: settings.pong_timeout(),
        }
    }

    /// Interval whose first tick fires one period from now.
    pub fn ticker(&self) -> Interval {
        let period = self.ping_interval.max(Duration::from_millis(1));
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    /// Ping, or give up if the peer has been idle past the pong timeout.
    pub fn check(&self, liveness: &Liveness) -> KeepaliveAction {
        if liveness.idle() > self.pong_timeout {
            KeepaliveAction::TimedOut
        } else {
            KeepaliveAction::Ping
        }
    }
}

impl Default for Keepalive {
    fn default() -> Self {
        Self::from_settings(&ServerSettings::default())
    }
}

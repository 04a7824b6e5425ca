//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::hub::HubStats;

/// Health check response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Connections registered with the hub.
    pub connections: usize,
    /// Rooms currently open.
    pub rooms: usize,
}

/// Build a health response from the hub's published counters.
pub fn health_check(start_time: Instant, stats: &HubStats) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.connections(),
        rooms: stats.rooms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_hub_reports_zero() {
        let resp = health_check(Instant::now(), &HubStats::default());
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.connections, 0);
        assert_eq!(resp.rooms, 0);
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, &HubStats::default());
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization() {
        let resp = health_check(Instant::now(), &HubStats::default());
        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["rooms"], 0);
        assert!(parsed["uptime_secs"].is_number());
    }
}

//! Health check payload.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Response body for `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live WebSocket connections (any auth state).
    pub connections: usize,
    /// Non-empty per-user rooms.
    pub rooms: usize,
}

/// Build a health response.
pub fn health_check(start_time: Instant, connections: usize, rooms: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        rooms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_counts() {
        let resp = health_check(Instant::now(), 3, 2);
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.connections, 3);
        assert_eq!(resp.rooms, 2);
    }

    #[test]
    fn serializes_expected_fields() {
        let resp = health_check(Instant::now(), 0, 0);
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("status").is_some());
        assert!(json.get("uptime_secs").is_some());
        assert!(json.get("connections").is_some());
        assert!(json.get("rooms").is_some());
    }
}

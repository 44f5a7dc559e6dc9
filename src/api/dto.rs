//! Data Transfer Objects
//!
//! Response bodies for the HTTP API.

use serde::Serialize;

/// Response for GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, unhealthy
    pub status: String,
    /// Hub loop status
    pub hub: String,
    /// Number of connected peers
    pub connections: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}

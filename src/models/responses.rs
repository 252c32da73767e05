//! Response DTOs for the status API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{ConnectionState, Liveness};
use crate::stats::ServiceStats;

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Liveness of the heartbeat as seen through the cache
    pub status: Liveness,
    /// State of the cache connection
    pub connection: ConnectionState,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn new(status: Liveness, connection: ConnectionState) -> Self {
        Self {
            status,
            connection,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == Liveness::Alive
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: ServiceStats,
    /// Failed drain cycles / all drain cycles
    pub failure_rate: f64,
    pub connection: ConnectionState,
    pub reconnect_attempts: u64,
    /// `redis_version` from the cache server's INFO report, when reachable
    pub cache_version: Option<String>,
}

impl StatsResponse {
    pub fn new(
        stats: ServiceStats,
        connection: ConnectionState,
        reconnect_attempts: u64,
        cache_version: Option<String>,
    ) -> Self {
        Self {
            failure_rate: stats.failure_rate(),
            stats,
            connection,
            reconnect_attempts,
            cache_version,
        }
    }
}

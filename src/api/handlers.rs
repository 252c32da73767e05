//! API Handlers
//!
//! HTTP request handlers for the status endpoints.

use axum::{extract::State, http::StatusCode, Json};

use crate::cache::CacheGateway;
use crate::models::{HealthResponse, StatsResponse};
use crate::stats::SharedStats;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Gateway to the cache holding the liveness record
    pub gateway: CacheGateway,
    /// Counters written by the background tasks
    pub stats: SharedStats,
}

impl AppState {
    pub fn new(gateway: CacheGateway, stats: SharedStats) -> Self {
        Self { gateway, stats }
    }
}

/// Handler for GET /health
///
/// 200 while the liveness record is present, 503 otherwise. The body tells
/// a lapsed record apart from an unreachable cache.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let liveness = state.gateway.liveness().await;
    let response = HealthResponse::new(liveness, state.gateway.state().await);

    let status = if response.is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.stats.read().await.clone();
    let cache_version = state
        .gateway
        .server_info()
        .await
        .and_then(|mut info| info.remove("redis_version"));

    Json(StatsResponse::new(
        stats,
        state.gateway.state().await,
        state.gateway.reconnect_attempts(),
        cache_version,
    ))
}

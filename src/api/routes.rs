//! API Routes
//!
//! Configures the Axum router for the status endpoints.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, stats_handler, AppState};

/// Creates the status router.
///
/// # Endpoints
/// - `GET /health` - Liveness of the service, 503 when the record has lapsed
/// - `GET /stats` - Heartbeat and drain counters
///
/// # Middleware
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! API Module
//!
//! HTTP handlers and routing for the status server.
//!
//! # Endpoints
//! - `GET /health` - Liveness check
//! - `GET /stats` - Service statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

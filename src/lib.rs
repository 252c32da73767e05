//! Cache Manager - keeps a liveness record in the shared cache and drains
//! the cache's data queue into Postgres in bulk batches.
//!
//! Provides a reconnecting cache gateway, a liveness heartbeat and a batch
//! drain scheduler, wired together by [`CacheManager`].

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod reporter;
pub mod settings;
pub mod sink;
pub mod stats;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use lifecycle::CacheManager;

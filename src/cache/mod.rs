//! Cache Module
//!
//! Owns everything that talks to the shared key/value + list cache store:
//! the backend seam, the Redis and in-memory backends, and the gateway that
//! keeps the single connection alive.

mod entry;
mod gateway;
mod memory;
mod redis;


use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// Re-export public types
pub use entry::CacheEntry;
pub use gateway::{CacheGateway, ConnectionState, GatewaySettings, Liveness, Lookup};
pub use memory::{MemoryBackend, MemoryStore};
pub use self::redis::RedisBackend;

// == Endpoint ==
/// Where the cache store lives and how to authenticate against it.
#[derive(Clone)]
pub struct CacheEndpoint {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl CacheEndpoint {
    pub fn new(host: impl Into<String>, port: u16, password: Option<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password,
        }
    }
}

impl std::fmt::Debug for CacheEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

// == Backend Seam ==
/// Opens connections to a cache store.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn open(&self, endpoint: &CacheEndpoint) -> Result<Arc<dyn CacheConnection>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// One open connection to a cache store.
///
/// Values are passed already JSON encoded. Errors that mean the link is gone
/// must be reported as [`CacheError::Connection`](crate::error::CacheError).
#[async_trait]
pub trait CacheConnection: Send + Sync {
    /// `SET key value [EX seconds]`
    async fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) -> Result<()>;

    /// `GET key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `RPUSH key value`
    async fn rpush(&self, key: &str, value: String) -> Result<()>;

    /// `LRANGE key start stop`
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;

    /// `LTRIM key start stop`
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()>;

    /// Raw `INFO` report
    async fn info(&self) -> Result<String>;
}

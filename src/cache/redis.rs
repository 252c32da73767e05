//! Redis cache backend
//!
//! Production backend built on a multiplexed tokio connection. The
//! multiplexed connection is cheap to clone, so each command clones it
//! instead of locking.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::cache::{CacheBackend, CacheConnection, CacheEndpoint};
use crate::error::{CacheError, Result};

/// Backend connecting to a Redis server over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisBackend;

impl RedisBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Builds connection parameters without going through a URL, so credentials
/// need no escaping.
fn connection_info(endpoint: &CacheEndpoint) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(endpoint.host.clone(), endpoint.port),
        redis: RedisConnectionInfo {
            password: endpoint.password.clone(),
            ..Default::default()
        },
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn open(&self, endpoint: &CacheEndpoint) -> Result<Arc<dyn CacheConnection>> {
        let client = Client::open(connection_info(endpoint))?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Arc::new(RedisConnection { conn }))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl CacheConnection for RedisConnection {
    async fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl_seconds {
            Some(seconds) => conn.set_ex::<_, _, ()>(key, value, seconds).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn rpush(&self, key: &str, value: String) -> Result<()> {
        let mut conn = self.conn.clone();
        let _length: i64 = conn.rpush(key, value).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn.lrange(key, start, stop).await?;
        Ok(items)
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.ltrim::<_, ()>(key, start, stop).await?;
        Ok(())
    }

    async fn info(&self) -> Result<String> {
        let mut conn = self.conn.clone();
        let report: String = redis::cmd("INFO").query_async(&mut conn).await?;
        Ok(report)
    }
}

//! Cache Entry Module
//!
//! Defines the structure for individual in-memory cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single string entry with value and expiry metadata.
///
/// Timestamps come from the tokio clock so paused-time tests can drive expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored (JSON encoded) value
    pub value: String,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL in whole seconds.
    pub fn new(value: String, ttl_seconds: Option<u64>) -> Self {
        let now = Instant::now();
        let expires_at = ttl_seconds.map(|ttl| now + Duration::from_secs(ttl));

        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches the expiration instant.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => Instant::now() >= expires,
            None => false,
        }
    }
}

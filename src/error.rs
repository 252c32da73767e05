//! Error types for the cache manager
//!
//! Provides unified error handling using thiserror. Each concern gets its own
//! enum so callers can match on exactly the failures they can act on.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Failures surfaced by the cache backends and the gateway.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No live connection to the cache store
    #[error("Cache not connected")]
    NotConnected,

    /// The link to the store failed (refused, dropped, I/O)
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// The store rejected a command
    #[error("Cache command failed: {0}")]
    Command(String),

    /// A store call did not settle within the operation timeout
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// A value could not be JSON encoded
    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),

    /// Expiry would be rounded down to zero seconds
    #[error("Invalid expiry: {0}")]
    InvalidExpiry(String),
}

impl CacheError {
    /// Returns true when the error means the connection itself is unusable.
    ///
    /// These errors move the gateway into its reconnect backoff at once; a
    /// run of timeouts does so only after several in a row.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, CacheError::Connection(_))
    }
}

// == Sink Error Enum ==
/// Failures of the relational sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Could not open a database connection
    #[error("Database connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    /// The bulk insert statement failed
    #[error("Bulk insert failed: {0}")]
    Query(#[source] sqlx::Error),

    /// The bulk insert did not finish in time
    #[error("Bulk insert timed out after {0:?}")]
    Timeout(Duration),

    /// The batch would bind more parameters than Postgres accepts
    #[error("Batch needs {needed} bind parameters, limit is {limit}")]
    TooManyParameters { needed: usize, limit: usize },
}

// == Settings Error Enum ==
/// Failures of the external settings lookup.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings unavailable: {0}")]
    Unavailable(String),
}

// == Drain Error Enum ==
/// Reasons a drain cycle stopped before trimming the queue.
#[derive(Error, Debug)]
pub enum DrainError {
    /// The queue could not be read, so nothing is known about its contents
    #[error("Could not read queue: {0}")]
    Queue(#[from] CacheError),

    #[error("Could not fetch database logging settings: {0}")]
    Settings(#[from] SettingsError),

    /// A queued record was not valid JSON for the row schema
    #[error("Queued record {index} could not be decoded: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not persist batch: {0}")]
    Persist(#[from] SinkError),
}

// == Config Error Enum ==
/// Rejected configuration values.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

//! Configuration Module
//!
//! Resolves the runtime environment profile once at process start and layers
//! environment variable overrides on top of it.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::sink::{DataFrameRow, TableRow, MAX_BIND_PARAMETERS};

// == Runtime Environment ==
/// Deployment profile selected through `RUNTIME_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    DevelopmentLocal,
    Development,
    Staging,
    ProductionLocal,
    Production,
}

impl RuntimeEnv {
    /// Resolves a profile name; anything unknown falls back to `Development`.
    pub fn resolve(name: Option<&str>) -> Self {
        match name {
            Some("development_local") => RuntimeEnv::DevelopmentLocal,
            Some("staging") => RuntimeEnv::Staging,
            Some("production_local") => RuntimeEnv::ProductionLocal,
            Some("production") => RuntimeEnv::Production,
            _ => RuntimeEnv::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeEnv::DevelopmentLocal => "development_local",
            RuntimeEnv::Development => "development",
            RuntimeEnv::Staging => "staging",
            RuntimeEnv::ProductionLocal => "production_local",
            RuntimeEnv::Production => "production",
        }
    }

    /// Base URL of the static REST server that receives error reports.
    pub fn static_api_base_url(&self) -> &'static str {
        match self {
            RuntimeEnv::DevelopmentLocal => "http://localhost:6055",
            RuntimeEnv::Development => "http://aws-ec2-development:6055",
            RuntimeEnv::Staging => "http://aws-ec2-staging:6055",
            RuntimeEnv::ProductionLocal => "http://dns-reroute-for-local-network:6055",
            RuntimeEnv::Production => "http://aws-ec2-production:6055",
        }
    }
}

impl fmt::Display for RuntimeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Backend Kind ==
/// Which cache store implementation the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    /// In-process store, for local runs without a Redis server
    Memory,
}

impl FromStr for CacheBackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redis" => Ok(CacheBackendKind::Redis),
            "memory" => Ok(CacheBackendKind::Memory),
            _ => Err(()),
        }
    }
}

/// Service configuration parameters.
///
/// Every value has a profile default and can be overridden through an
/// environment variable of the same name in upper case.
#[derive(Debug, Clone)]
pub struct Config {
    pub runtime_env: RuntimeEnv,
    pub package_name: String,
    pub package_version: String,

    pub cache_backend: CacheBackendKind,
    pub redis_host: String,
    pub redis_port: u16,
    pub cache_auth_token: Option<String>,

    pub pg_host: String,
    pub pg_port: u16,
    pub pg_user: String,
    pub pg_password: String,
    pub pg_database: String,

    /// Base URL of the error-logging REST server
    pub static_api_base_url: String,

    pub heartbeat_interval_ms: u64,
    /// Expiry of the liveness record; must exceed the heartbeat interval
    pub heartbeat_ttl_ms: u64,
    /// Delay between drain cycles
    pub drain_interval_ms: u64,
    pub max_batch_size: usize,
    pub reconnect_backoff_ms: u64,
    /// Upper bound for every single cache or database call
    pub operation_timeout_ms: u64,
    pub error_report_timeout_ms: u64,

    /// Status server port, None when disabled
    pub status_port: Option<u16>,
    pub queue_key: String,
    pub liveness_key: String,
    pub log_drained_records: bool,
}

impl Config {
    // == Profiles ==
    /// Returns the defaults of a runtime environment profile.
    pub fn profile(runtime_env: RuntimeEnv) -> Self {
        let (drain_interval_ms, max_batch_size) = match runtime_env {
            RuntimeEnv::DevelopmentLocal => (10_000, 5),
            _ => (20_000, 500),
        };

        Self {
            runtime_env,
            package_name: env!("CARGO_PKG_NAME").to_string(),
            package_version: env!("CARGO_PKG_VERSION").to_string(),
            cache_backend: CacheBackendKind::Redis,
            redis_host: "127.0.0.1".to_string(),
            redis_port: 6379,
            cache_auth_token: None,
            pg_host: "localhost".to_string(),
            pg_port: 5432,
            pg_user: String::new(),
            pg_password: String::new(),
            pg_database: "postgres".to_string(),
            static_api_base_url: runtime_env.static_api_base_url().to_string(),
            heartbeat_interval_ms: 5_000,
            heartbeat_ttl_ms: 10_000,
            drain_interval_ms,
            max_batch_size,
            reconnect_backoff_ms: 60_000,
            operation_timeout_ms: 5_000,
            error_report_timeout_ms: 5_000,
            status_port: Some(6070),
            queue_key: "data_queue".to_string(),
            liveness_key: "cache_manager_active".to_string(),
            log_drained_records: false,
        }
    }

    /// Creates a new Config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Creates a new Config resolving variables through `lookup`.
    ///
    /// Empty or unparsable numeric values keep the profile default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let runtime_env = RuntimeEnv::resolve(lookup("RUNTIME_ENV").as_deref());
        let base = Self::profile(runtime_env);

        let text = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let status_port = match parse_var(&lookup, "STATUS_PORT") {
            Some(0) => None,
            Some(port) => Some(port),
            None => base.status_port,
        };

        Self {
            runtime_env,
            package_name: base.package_name,
            package_version: base.package_version,
            cache_backend: parse_var(&lookup, "CACHE_BACKEND").unwrap_or(base.cache_backend),
            redis_host: text("REDIS_HOST").unwrap_or(base.redis_host),
            redis_port: parse_var(&lookup, "REDIS_PORT").unwrap_or(base.redis_port),
            cache_auth_token: text("CACHE_AUTH_TOKEN").or(base.cache_auth_token),
            pg_host: text("PG_HOST").unwrap_or(base.pg_host),
            pg_port: parse_var(&lookup, "PG_PORT").unwrap_or(base.pg_port),
            pg_user: text("PG_USER").unwrap_or(base.pg_user),
            pg_password: text("PG_PASSWORD").unwrap_or(base.pg_password),
            pg_database: text("PG_DATABASE").unwrap_or(base.pg_database),
            static_api_base_url: text("STATIC_API_BASE_URL").unwrap_or(base.static_api_base_url),
            heartbeat_interval_ms: parse_var(&lookup, "HEARTBEAT_INTERVAL_MS")
                .unwrap_or(base.heartbeat_interval_ms),
            heartbeat_ttl_ms: parse_var(&lookup, "HEARTBEAT_TTL_MS").unwrap_or(base.heartbeat_ttl_ms),
            drain_interval_ms: parse_var(&lookup, "DRAIN_INTERVAL_MS").unwrap_or(base.drain_interval_ms),
            max_batch_size: parse_var(&lookup, "MAX_BATCH_SIZE").unwrap_or(base.max_batch_size),
            reconnect_backoff_ms: parse_var(&lookup, "RECONNECT_BACKOFF_MS")
                .unwrap_or(base.reconnect_backoff_ms),
            operation_timeout_ms: parse_var(&lookup, "OPERATION_TIMEOUT_MS")
                .unwrap_or(base.operation_timeout_ms),
            error_report_timeout_ms: parse_var(&lookup, "ERROR_REPORT_TIMEOUT_MS")
                .unwrap_or(base.error_report_timeout_ms),
            status_port,
            queue_key: text("QUEUE_KEY").unwrap_or(base.queue_key),
            liveness_key: text("LIVENESS_KEY").unwrap_or(base.liveness_key),
            log_drained_records: parse_var(&lookup, "LOG_DRAINED_RECORDS").unwrap_or(base.log_drained_records),
        }
    }

    // == Validation ==
    /// Rejects combinations the scheduling guarantees depend on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::invalid("HEARTBEAT_INTERVAL_MS", "must be positive"));
        }
        if self.heartbeat_ttl_ms < 1_000 {
            return Err(ConfigError::invalid(
                "HEARTBEAT_TTL_MS",
                "must be at least 1000, expiry is applied in whole seconds",
            ));
        }
        // Compare the expiry the store will actually apply
        let effective_ttl_ms = (self.heartbeat_ttl_ms / 1_000) * 1_000;
        if effective_ttl_ms <= self.heartbeat_interval_ms {
            return Err(ConfigError::invalid(
                "HEARTBEAT_TTL_MS",
                format!(
                    "must exceed the heartbeat interval of {}ms once rounded down to whole seconds ({}ms)",
                    self.heartbeat_interval_ms, effective_ttl_ms
                ),
            ));
        }
        if self.drain_interval_ms == 0 {
            return Err(ConfigError::invalid("DRAIN_INTERVAL_MS", "must be positive"));
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::invalid("MAX_BATCH_SIZE", "must be at least 1"));
        }
        let parameters = self.max_batch_size * DataFrameRow::COLUMNS.len();
        if parameters > MAX_BIND_PARAMETERS {
            return Err(ConfigError::invalid(
                "MAX_BATCH_SIZE",
                format!(
                    "a full batch binds {} parameters, limit is {}",
                    parameters, MAX_BIND_PARAMETERS
                ),
            ));
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::invalid("OPERATION_TIMEOUT_MS", "must be positive"));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ttl_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn error_report_timeout(&self) -> Duration {
        Duration::from_millis(self.error_report_timeout_ms)
    }
}

/// Parses a variable, treating empty or malformed values as unset.
fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::profile(RuntimeEnv::Development)
    }
}

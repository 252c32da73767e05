//! Process Lifecycle
//!
//! Builds every component once and starts and stops them in order:
//! cache connection, heartbeat, drain scheduler on the way up and the
//! reverse on the way down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Datelike, Utc};
use tracing::{error, info};

use crate::cache::{
    CacheBackend, CacheEndpoint, CacheGateway, GatewaySettings, MemoryBackend, RedisBackend,
};
use crate::config::{CacheBackendKind, Config};
use crate::reporter::ErrorReporter;
use crate::settings::{ConfiguredSettings, DatabaseLoggingSettings, SettingsSource};
use crate::sink::{DataFrameRow, PgSink, RecordSink};
use crate::stats::{ServiceStats, SharedStats};
use crate::tasks::{DrainCycle, DrainScheduler, Heartbeat};

/// Suppression window for a failed startup, so a crash loop reports once.
pub const STARTUP_ERROR_LOCK: Duration = Duration::from_secs(30 * 60);

/// Boot banner printed before anything else.
pub fn boot_banner(package_name: &str, version: &str, runtime_env: &str) -> String {
    format!(
        "!\n! {}\n! v.{}_{}\n!\n! Copyright {}\n!",
        package_name,
        version,
        runtime_env,
        Utc::now().year()
    )
}

// == Cache Manager ==
pub struct CacheManager {
    config: Config,
    gateway: CacheGateway,
    heartbeat: Heartbeat,
    drain: DrainScheduler<DataFrameRow>,
    reporter: ErrorReporter,
    stats: SharedStats,
}

impl CacheManager {
    /// Wires the components around an already built gateway, sink and
    /// settings source.
    pub fn new(
        config: Config,
        gateway: CacheGateway,
        sink: Arc<dyn RecordSink<DataFrameRow>>,
        settings: Arc<dyn SettingsSource>,
        reporter: ErrorReporter,
    ) -> Self {
        let stats = ServiceStats::shared();

        let heartbeat = Heartbeat::new(
            gateway.clone(),
            config.heartbeat_interval(),
            config.heartbeat_ttl(),
            stats.clone(),
        );

        let cycle = DrainCycle::new(
            gateway.clone(),
            config.queue_key.clone(),
            config.max_batch_size,
            sink,
            settings,
            stats.clone(),
        );
        let drain = DrainScheduler::new(cycle, config.drain_interval());

        Self {
            config,
            gateway,
            heartbeat,
            drain,
            reporter,
            stats,
        }
    }

    /// Builds the production components described by `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let backend: Arc<dyn CacheBackend> = match config.cache_backend {
            CacheBackendKind::Redis => Arc::new(RedisBackend::new()),
            CacheBackendKind::Memory => Arc::new(MemoryBackend::new()),
        };

        let gateway = CacheGateway::new(
            backend,
            CacheEndpoint::new(
                config.redis_host.clone(),
                config.redis_port,
                config.cache_auth_token.clone(),
            ),
            GatewaySettings {
                reconnect_backoff: config.reconnect_backoff(),
                operation_timeout: config.operation_timeout(),
                liveness_key: config.liveness_key.clone(),
            },
        );

        let sink = Arc::new(PgSink::from_config(&config));
        let settings = Arc::new(ConfiguredSettings::new(DatabaseLoggingSettings {
            log_drained_records: config.log_drained_records,
        }));
        let reporter = ErrorReporter::new(&config.static_api_base_url, config.error_report_timeout())
            .context("Failed to build error reporting client")?;

        Ok(Self::new(config, gateway, sink, settings, reporter))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gateway(&self) -> &CacheGateway {
        &self.gateway
    }

    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.heartbeat.is_running() && self.drain.is_running()
    }

    // == Startup ==
    /// Connects the cache, then starts the heartbeat and the drain scheduler.
    ///
    /// A failed first connection is reported and left to the gateway's
    /// reconnect backoff; the timers start regardless.
    pub async fn initialize(&mut self) {
        println!(
            "{}",
            boot_banner(
                &self.config.package_name,
                &self.config.package_version,
                self.config.runtime_env.as_str(),
            )
        );
        info!("{}", Utc::now().to_rfc2822());

        info!("Connecting cache client");
        if let Err(err) = self.gateway.connect().await {
            error!(error = %err, "Failed to start Cache Manager");
            let reporter = self.reporter.clone();
            let details = err.to_string();
            // Startup goes on while the report is in flight
            tokio::spawn(async move {
                reporter
                    .log_system_error(
                        "CacheManager::initialize",
                        "cache_manager_initialize_failed",
                        &details,
                        STARTUP_ERROR_LOCK,
                    )
                    .await;
            });
        }

        self.heartbeat.initialize().await;
        self.drain.initialize().await;

        info!("Cache Manager: Startup complete");
    }

    // == Shutdown ==
    /// Stops the timers, then closes the cache connection. Safe to call more
    /// than once.
    pub async fn shutdown(&mut self) {
        self.heartbeat.shutdown().await;
        self.drain.shutdown().await;
        self.gateway.disconnect().await;

        info!("Cache Manager: Shutdown complete");
    }
}

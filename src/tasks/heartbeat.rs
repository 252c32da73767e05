//! Liveness Heartbeat
//!
//! Refreshes the liveness record on a fixed interval with an expiry longer
//! than the interval. Observers treat a lapsed record as a dead service.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::CacheGateway;
use crate::stats::SharedStats;
use crate::tasks::{Ticker, STOP_GRACE};

pub struct Heartbeat {
    gateway: CacheGateway,
    interval: Duration,
    ttl: Duration,
    stats: SharedStats,
    ticker: Option<Ticker>,
}

impl Heartbeat {
    /// # Arguments
    /// * `gateway` - Gateway holding the liveness key
    /// * `interval` - Time between two writes
    /// * `ttl` - Expiry of each write, longer than `interval`
    /// * `stats` - Counters updated on every write
    pub fn new(gateway: CacheGateway, interval: Duration, ttl: Duration, stats: SharedStats) -> Self {
        Self {
            gateway,
            interval,
            ttl,
            stats,
            ticker: None,
        }
    }

    /// Writes the liveness record once. Returns whether the cache took it.
    pub async fn beat(&self) -> bool {
        write_liveness(&self.gateway, self.ttl, &self.stats).await
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Starts the recurring write, replacing a ticker left by an earlier call.
    pub async fn initialize(&mut self) {
        self.shutdown().await;

        let gateway = self.gateway.clone();
        let stats = self.stats.clone();
        let ttl = self.ttl;

        self.ticker = Some(Ticker::spawn("heartbeat", self.interval, move || {
            let gateway = gateway.clone();
            let stats = stats.clone();
            async move {
                write_liveness(&gateway, ttl, &stats).await;
            }
        }));

        info!(
            interval_ms = self.interval.as_millis() as u64,
            ttl_ms = self.ttl.as_millis() as u64,
            "Heartbeat started"
        );
    }

    /// Stops the recurring write. The liveness record is left to expire.
    pub async fn shutdown(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop(STOP_GRACE).await;
            info!("Heartbeat stopped");
        }
    }
}

async fn write_liveness(gateway: &CacheGateway, ttl: Duration, stats: &SharedStats) -> bool {
    let written = gateway.set_item(gateway.liveness_key(), &true, Some(ttl)).await;
    if written {
        debug!(key = gateway.liveness_key(), "Liveness record refreshed");
    } else {
        warn!(key = gateway.liveness_key(), "Liveness record write failed");
    }
    stats.write().await.record_heartbeat(written);
    written
}

//! Service Statistics Module
//!
//! Tracks heartbeat and drain pipeline counters for the status endpoint.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Statistics shared between the heartbeat, the drain scheduler and the
/// status handlers.
pub type SharedStats = Arc<RwLock<ServiceStats>>;

// == Service Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceStats {
    /// Successful liveness writes
    pub heartbeats_written: u64,
    /// Liveness writes the cache did not accept
    pub heartbeat_failures: u64,
    /// Drain ticks run, whatever their outcome
    pub drain_cycles: u64,
    /// Drain ticks that found the queue empty
    pub empty_cycles: u64,
    /// Rows persisted across all batches
    pub records_persisted: u64,
    /// Drain ticks that stopped before trimming
    pub failed_cycles: u64,
    /// Persisted batches whose trim failed (they will be delivered again)
    pub trim_failures: u64,
    pub last_drain_at: Option<DateTime<Utc>>,
}

impl ServiceStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStats {
        Arc::new(RwLock::new(Self::new()))
    }

    // == Failure Rate ==
    /// Share of drain cycles that failed, 0.0 when none ran.
    pub fn failure_rate(&self) -> f64 {
        if self.drain_cycles == 0 {
            0.0
        } else {
            self.failed_cycles as f64 / self.drain_cycles as f64
        }
    }

    // == Recorders ==
    pub fn record_heartbeat(&mut self, written: bool) {
        if written {
            self.heartbeats_written += 1;
        } else {
            self.heartbeat_failures += 1;
        }
    }

    pub fn record_empty_cycle(&mut self) {
        self.drain_cycles += 1;
        self.empty_cycles += 1;
    }

    pub fn record_persisted(&mut self, count: usize, trimmed: bool) {
        self.drain_cycles += 1;
        self.records_persisted += count as u64;
        if !trimmed {
            self.trim_failures += 1;
        }
        self.last_drain_at = Some(Utc::now());
    }

    pub fn record_failed_cycle(&mut self) {
        self.drain_cycles += 1;
        self.failed_cycles += 1;
    }
}

//! Batch Drain Scheduler
//!
//! Moves queued records from the cache list into the relational sink. One
//! cycle reads a bounded batch from the head of the list, persists it with a
//! single bulk insert and only then trims exactly the records it read.
//!
//! The trim uses the length of the batch actually read. Producers keep
//! appending while the insert runs, so trimming by the configured maximum
//! would drop records that were never persisted.
//!
//! A cycle that fails before the trim leaves the queue untouched and the
//! batch is read again on the next tick (at-least-once delivery).

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::cache::CacheGateway;
use crate::error::DrainError;
use crate::settings::SettingsSource;
use crate::sink::{RecordSink, TableRow};
use crate::stats::SharedStats;
use crate::tasks::{Ticker, STOP_GRACE};

/// Result of one drain cycle that ran to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue had nothing to drain
    Empty,
    /// `count` records were persisted; `trimmed` is false when the trim
    /// failed and the batch will be delivered again
    Persisted { count: usize, trimmed: bool },
}

// == Drain Cycle ==
pub struct DrainCycle<R> {
    gateway: CacheGateway,
    queue_key: String,
    max_batch_size: usize,
    sink: Arc<dyn RecordSink<R>>,
    settings: Arc<dyn SettingsSource>,
    stats: SharedStats,
}

impl<R> Clone for DrainCycle<R> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            queue_key: self.queue_key.clone(),
            max_batch_size: self.max_batch_size,
            sink: self.sink.clone(),
            settings: self.settings.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<R> DrainCycle<R>
where
    R: TableRow + DeserializeOwned,
{
    /// # Arguments
    /// * `gateway` - Gateway owning the queue list
    /// * `queue_key` - Key of the list producers append to
    /// * `max_batch_size` - Most records read per cycle
    /// * `sink` - Destination of the decoded rows
    /// * `settings` - Logging settings, fetched once per non-empty cycle
    /// * `stats` - Counters updated by `tick`
    pub fn new(
        gateway: CacheGateway,
        queue_key: impl Into<String>,
        max_batch_size: usize,
        sink: Arc<dyn RecordSink<R>>,
        settings: Arc<dyn SettingsSource>,
        stats: SharedStats,
    ) -> Self {
        Self {
            gateway,
            queue_key: queue_key.into(),
            max_batch_size,
            sink,
            settings,
            stats,
        }
    }

    /// Runs one read, persist, trim cycle.
    pub async fn run_once(&self) -> Result<DrainOutcome, DrainError> {
        let stop = self.max_batch_size as isize - 1;
        let batch = self
            .gateway
            .try_list_range(&self.queue_key, 0, stop)
            .await?;
        if batch.is_empty() {
            return Ok(DrainOutcome::Empty);
        }

        let settings = self.settings.database_logging_settings().await?;

        let rows = batch
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                serde_json::from_str::<R>(raw).map_err(|source| DrainError::Decode { index, source })
            })
            .collect::<Result<Vec<R>, DrainError>>()?;

        self.sink.insert_rows(&rows).await?;
        debug!(
            count = rows.len(),
            table = R::TABLE,
            "Saved data records from cache queue"
        );

        if settings.log_drained_records {
            let keys: Vec<&str> = rows.iter().map(|row| row.log_key()).collect();
            debug!(records = ?keys, "Drained records");
        }

        let trimmed = self
            .gateway
            .list_trim(&self.queue_key, batch.len() as isize, -1)
            .await;
        if !trimmed {
            warn!(
                count = batch.len(),
                queue = %self.queue_key,
                "Persisted batch could not be trimmed from the queue, it will be delivered again"
            );
        }

        Ok(DrainOutcome::Persisted {
            count: batch.len(),
            trimmed,
        })
    }

    /// Runs one cycle and records its outcome. Never fails.
    pub async fn tick(&self) {
        let outcome = self.run_once().await;
        let mut stats = self.stats.write().await;
        match outcome {
            Ok(DrainOutcome::Empty) => {
                debug!(queue = %self.queue_key, "No items found in queue");
                stats.record_empty_cycle();
            }
            Ok(DrainOutcome::Persisted { count, trimmed }) => {
                stats.record_persisted(count, trimmed);
            }
            Err(DrainError::Queue(err)) => {
                warn!(queue = %self.queue_key, error = %err, "Queue unreadable, drain cycle skipped");
                stats.record_failed_cycle();
            }
            Err(err) => {
                error!(queue = %self.queue_key, error = %err, "Drain cycle failed, batch left in queue");
                stats.record_failed_cycle();
            }
        }
    }
}

// == Drain Scheduler ==
/// Runs the drain cycle on a fixed interval.
pub struct DrainScheduler<R> {
    cycle: DrainCycle<R>,
    interval: Duration,
    ticker: Option<Ticker>,
}

impl<R> DrainScheduler<R>
where
    R: TableRow + DeserializeOwned,
{
    pub fn new(cycle: DrainCycle<R>, interval: Duration) -> Self {
        Self {
            cycle,
            interval,
            ticker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Starts draining, replacing a ticker left by an earlier call. The next
    /// cycle is scheduled whatever the outcome of the previous one.
    pub async fn initialize(&mut self) {
        self.shutdown().await;

        let cycle = self.cycle.clone();
        self.ticker = Some(Ticker::spawn("drain", self.interval, move || {
            let cycle = cycle.clone();
            async move { cycle.tick().await }
        }));

        info!(
            queue = %self.cycle.queue_key,
            interval_ms = self.interval.as_millis() as u64,
            max_batch_size = self.cycle.max_batch_size,
            "Drain scheduler started"
        );
    }

    pub async fn shutdown(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop(STOP_GRACE).await;
            info!("Drain scheduler shutdown complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use tokio::sync::Mutex;
    use tokio::time::sleep;

    use crate::cache::{CacheEndpoint, GatewaySettings, MemoryBackend};
    use crate::error::{SettingsError, SinkError};
    use crate::settings::{ConfiguredSettings, DatabaseLoggingSettings};
    use crate::sink::DataFrameRow;
    use crate::stats::ServiceStats;

    const QUEUE: &str = "data_queue";
    const INTERVAL: Duration = Duration::from_secs(20);

    /// Records every batch; optionally fails, optionally appends to the
    /// queue while "persisting".
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<String>>>,
        fail: AtomicBool,
        append_during_insert: Option<(CacheGateway, Vec<DataFrameRow>)>,
    }

    impl RecordingSink {
        async fn persisted_ids(&self) -> Vec<Vec<String>> {
            self.batches.lock().await.clone()
        }
    }

    #[async_trait]
    impl RecordSink<DataFrameRow> for RecordingSink {
        async fn insert_rows(&self, rows: &[DataFrameRow]) -> Result<u64, SinkError> {
            if let Some((gateway, extra)) = &self.append_during_insert {
                for row in extra {
                    gateway.push_item(QUEUE, row).await;
                }
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(SinkError::Timeout(Duration::from_secs(5)));
            }
            let ids = rows.iter().map(|row| row.frame_id.clone()).collect();
            self.batches.lock().await.push(ids);
            Ok(rows.len() as u64)
        }
    }

    struct UnavailableSettings;

    #[async_trait]
    impl SettingsSource for UnavailableSettings {
        async fn database_logging_settings(&self) -> Result<DatabaseLoggingSettings, SettingsError> {
            Err(SettingsError::Unavailable("settings service down".to_string()))
        }
    }

    fn frame(id: &str) -> DataFrameRow {
        DataFrameRow {
            frame_id: id.to_string(),
            source: "uplink".to_string(),
            frame_ts: Utc::now(),
            payload: json!({ "seq": id }),
        }
    }

    async fn connected_gateway(backend: &MemoryBackend) -> CacheGateway {
        let gateway = CacheGateway::new(
            Arc::new(backend.clone()),
            CacheEndpoint::new("127.0.0.1", 6379, None),
            GatewaySettings {
                reconnect_backoff: Duration::from_secs(60),
                operation_timeout: Duration::from_secs(5),
                liveness_key: "cache_manager_active".to_string(),
            },
        );
        gateway.connect().await.unwrap();
        gateway
    }

    async fn push_frames(gateway: &CacheGateway, ids: &[&str]) {
        for id in ids {
            assert!(gateway.push_item(QUEUE, &frame(id)).await);
        }
    }

    async fn queued_ids(gateway: &CacheGateway) -> Vec<String> {
        gateway
            .list_range(QUEUE, 0, -1)
            .await
            .iter()
            .map(|raw| serde_json::from_str::<DataFrameRow>(raw).unwrap().frame_id)
            .collect()
    }

    fn cycle_with(
        gateway: &CacheGateway,
        max_batch_size: usize,
        sink: Arc<RecordingSink>,
        settings: Arc<dyn SettingsSource>,
    ) -> DrainCycle<DataFrameRow> {
        DrainCycle::new(
            gateway.clone(),
            QUEUE,
            max_batch_size,
            sink,
            settings,
            ServiceStats::shared(),
        )
    }

    fn logging_settings() -> Arc<dyn SettingsSource> {
        Arc::new(ConfiguredSettings::new(DatabaseLoggingSettings {
            log_drained_records: true,
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_head_and_trims_batch_length() {
        let gateway = connected_gateway(&MemoryBackend::new()).await;
        push_frames(&gateway, &["r1", "r2", "r3"]).await;
        let sink = Arc::new(RecordingSink::default());
        let cycle = cycle_with(&gateway, 2, sink.clone(), logging_settings());

        let outcome = cycle.run_once().await.unwrap();

        assert_eq!(outcome, DrainOutcome::Persisted { count: 2, trimmed: true });
        assert_eq!(sink.persisted_ids().await, vec![vec!["r1", "r2"]]);
        assert_eq!(queued_ids(&gateway).await, vec!["r3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_skips_persistence() {
        let gateway = connected_gateway(&MemoryBackend::new()).await;
        let sink = Arc::new(RecordingSink::default());
        // Settings are not consulted for an empty batch
        let cycle = cycle_with(&gateway, 2, sink.clone(), Arc::new(UnavailableSettings));

        assert_eq!(cycle.run_once().await.unwrap(), DrainOutcome::Empty);
        assert!(sink.persisted_ids().await.is_empty());
        assert!(queued_ids(&gateway).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_appends_survive_trim() {
        let backend = MemoryBackend::new();
        let gateway = connected_gateway(&backend).await;
        push_frames(&gateway, &["r1", "r2"]).await;

        let sink = Arc::new(RecordingSink {
            append_during_insert: Some((gateway.clone(), vec![frame("r3"), frame("r4")])),
            ..Default::default()
        });
        let cycle = cycle_with(&gateway, 5, sink.clone(), logging_settings());

        let outcome = cycle.run_once().await.unwrap();

        assert_eq!(outcome, DrainOutcome::Persisted { count: 2, trimmed: true });
        assert_eq!(queued_ids(&gateway).await, vec!["r3", "r4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_failure_leaves_queue_unchanged() {
        let gateway = connected_gateway(&MemoryBackend::new()).await;
        push_frames(&gateway, &["r1", "r2", "r3"]).await;
        let sink = Arc::new(RecordingSink::default());
        sink.fail.store(true, Ordering::SeqCst);
        let cycle = cycle_with(&gateway, 2, sink.clone(), logging_settings());

        let err = cycle.run_once().await.unwrap_err();

        assert!(matches!(err, DrainError::Persist(_)));
        assert_eq!(queued_ids(&gateway).await, vec!["r1", "r2", "r3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_failure_leaves_queue_unchanged() {
        let gateway = connected_gateway(&MemoryBackend::new()).await;
        push_frames(&gateway, &["r1"]).await;
        let sink = Arc::new(RecordingSink::default());
        let cycle = cycle_with(&gateway, 2, sink.clone(), Arc::new(UnavailableSettings));

        let err = cycle.run_once().await.unwrap_err();

        assert!(matches!(err, DrainError::Settings(_)));
        assert!(sink.persisted_ids().await.is_empty());
        assert_eq!(queued_ids(&gateway).await, vec!["r1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_record_aborts_whole_batch() {
        let gateway = connected_gateway(&MemoryBackend::new()).await;
        push_frames(&gateway, &["r1"]).await;
        assert!(gateway.push_item(QUEUE, "not a frame").await);
        let sink = Arc::new(RecordingSink::default());
        let cycle = cycle_with(&gateway, 10, sink.clone(), logging_settings());

        let err = cycle.run_once().await.unwrap_err();

        assert!(matches!(err, DrainError::Decode { index: 1, .. }));
        assert!(sink.persisted_ids().await.is_empty());
        assert_eq!(gateway.list_range(QUEUE, 0, -1).await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trim_reports_redelivery() {
        let backend = MemoryBackend::new();
        let gateway = connected_gateway(&backend).await;
        push_frames(&gateway, &["r1"]).await;

        // Cache drops out while the batch is being persisted
        struct DroppingSink(MemoryBackend);

        #[async_trait]
        impl RecordSink<DataFrameRow> for DroppingSink {
            async fn insert_rows(&self, rows: &[DataFrameRow]) -> Result<u64, SinkError> {
                self.0.set_reachable(false);
                Ok(rows.len() as u64)
            }
        }

        let cycle: DrainCycle<DataFrameRow> = DrainCycle::new(
            gateway.clone(),
            QUEUE,
            10,
            Arc::new(DroppingSink(backend.clone())),
            logging_settings(),
            ServiceStats::shared(),
        );

        let outcome = cycle.run_once().await.unwrap();
        assert_eq!(outcome, DrainOutcome::Persisted { count: 1, trimmed: false });
        assert_eq!(backend.list(QUEUE).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_queue_is_not_an_empty_cycle() {
        let backend = MemoryBackend::new();
        let gateway = connected_gateway(&backend).await;
        push_frames(&gateway, &["r1"]).await;
        let sink = Arc::new(RecordingSink::default());
        let stats = ServiceStats::shared();
        let cycle = DrainCycle::new(
            gateway.clone(),
            QUEUE,
            2,
            sink.clone() as Arc<dyn RecordSink<DataFrameRow>>,
            logging_settings(),
            stats.clone(),
        );

        backend.set_reachable(false);
        let err = cycle.run_once().await.unwrap_err();
        assert!(matches!(err, DrainError::Queue(_)));

        // Gateway is now in backoff without a connection
        cycle.tick().await;

        let stats = stats.read().await;
        assert_eq!(stats.drain_cycles, 1);
        assert_eq!(stats.empty_cycles, 0);
        assert_eq!(stats.failed_cycles, 1);
        assert!(sink.persisted_ids().await.is_empty());
        assert_eq!(backend.list(QUEUE).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_keeps_running_after_failure() {
        let gateway = connected_gateway(&MemoryBackend::new()).await;
        push_frames(&gateway, &["r1", "r2", "r3"]).await;
        let sink = Arc::new(RecordingSink::default());
        sink.fail.store(true, Ordering::SeqCst);
        let stats = ServiceStats::shared();
        let cycle = DrainCycle::new(
            gateway.clone(),
            QUEUE,
            2,
            sink.clone() as Arc<dyn RecordSink<DataFrameRow>>,
            logging_settings(),
            stats.clone(),
        );
        let mut scheduler = DrainScheduler::new(cycle, INTERVAL);
        scheduler.initialize().await;

        sleep(INTERVAL + Duration::from_millis(100)).await;
        assert_eq!(stats.read().await.failed_cycles, 1);
        assert_eq!(queued_ids(&gateway).await, vec!["r1", "r2", "r3"]);

        sink.fail.store(false, Ordering::SeqCst);
        sleep(INTERVAL).await;
        assert_eq!(queued_ids(&gateway).await, vec!["r3"]);

        sleep(INTERVAL).await;
        assert!(queued_ids(&gateway).await.is_empty());

        // Empty queue, still ticking
        sleep(INTERVAL).await;
        scheduler.shutdown().await;

        let stats = stats.read().await;
        assert_eq!(stats.drain_cycles, 4);
        assert_eq!(stats.empty_cycles, 1);
        assert_eq!(stats.records_persisted, 3);
        assert_eq!(
            sink.persisted_ids().await,
            vec![vec!["r1", "r2"], vec!["r3"]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_stops_on_shutdown() {
        let gateway = connected_gateway(&MemoryBackend::new()).await;
        let stats = ServiceStats::shared();
        let cycle = DrainCycle::new(
            gateway.clone(),
            QUEUE,
            2,
            Arc::new(RecordingSink::default()) as Arc<dyn RecordSink<DataFrameRow>>,
            logging_settings(),
            stats.clone(),
        );
        let mut scheduler = DrainScheduler::new(cycle, INTERVAL);

        scheduler.initialize().await;
        scheduler.initialize().await;
        assert!(scheduler.is_running());

        sleep(INTERVAL + Duration::from_millis(100)).await;
        scheduler.shutdown().await;
        scheduler.shutdown().await;
        assert!(!scheduler.is_running());

        push_frames(&gateway, &["late"]).await;
        sleep(INTERVAL * 3).await;

        assert_eq!(stats.read().await.drain_cycles, 1);
        assert_eq!(queued_ids(&gateway).await, vec!["late"]);
    }
}

//! Cache Gateway
//!
//! Owns the single connection to the cache store. Every other component goes
//! through the gateway and never sees the connection itself.
//!
//! State machine:
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//!                                |                 |
//!                              error        connection error
//!                                v                 v
//!                           ErrorBackoff <---------+
//!                                |
//!                        backoff elapsed --> connect
//! ```
//!
//! At most one backoff timer is pending at a time and `disconnect` always
//! cancels it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheBackend, CacheConnection, CacheEndpoint};
use crate::error::{CacheError, Result};

/// Consecutive command timeouts after which the connection is treated as dead.
const MAX_CONSECUTIVE_TIMEOUTS: u32 = 3;

// == Connection State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting for the backoff timer before reconnecting
    ErrorBackoff,
}

// == Read Results ==
/// Outcome of a single key read, keeping apart the causes `get_item` folds
/// into "absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    NotFound,
    Disconnected,
    Failed,
}

impl Lookup {
    pub fn into_option(self) -> Option<String> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Liveness of the heartbeat writer as seen through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The liveness record is present
    Alive,
    /// The cache answered but the record has lapsed
    Absent,
    /// The cache itself could not be asked
    CacheUnreachable,
}

impl Liveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Liveness::Alive => "alive",
            Liveness::Absent => "absent",
            Liveness::CacheUnreachable => "cache_unreachable",
        }
    }
}

impl Serialize for Liveness {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// == Settings ==
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Delay before an automatic reconnect attempt
    pub reconnect_backoff: Duration,
    /// Upper bound for connecting and for every store call
    pub operation_timeout: Duration,
    /// Key of the liveness record
    pub liveness_key: String,
}

struct ActiveConnection {
    id: u64,
    conn: Arc<dyn CacheConnection>,
    /// Reset by every command that settles in time
    timeouts: Arc<AtomicU32>,
}

struct GatewayInner {
    state: ConnectionState,
    connection: Option<ActiveConnection>,
    reconnect: Option<JoinHandle<()>>,
    /// Bumped by `disconnect` so late connects and timers can tell they are stale
    epoch: u64,
    next_connection_id: u64,
}

struct Shared {
    backend: Arc<dyn CacheBackend>,
    endpoint: CacheEndpoint,
    settings: GatewaySettings,
    inner: Mutex<GatewayInner>,
    reconnect_attempts: AtomicU64,
}

// == Cache Gateway ==
/// Cheaply clonable handle to the one cache connection of the process.
#[derive(Clone)]
pub struct CacheGateway {
    shared: Arc<Shared>,
}

impl CacheGateway {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        endpoint: CacheEndpoint,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                endpoint,
                settings,
                inner: Mutex::new(GatewayInner {
                    state: ConnectionState::Disconnected,
                    connection: None,
                    reconnect: None,
                    epoch: 0,
                    next_connection_id: 0,
                }),
                reconnect_attempts: AtomicU64::new(0),
            }),
        }
    }

    // == Lifecycle ==
    /// Opens the connection. A no-op when already connected or connecting.
    ///
    /// On failure the gateway enters its backoff and retries on its own; the
    /// error is still returned so startup can report it.
    pub async fn connect(&self) -> Result<()> {
        let epoch = {
            let mut inner = self.shared.inner.lock().await;
            match inner.state {
                ConnectionState::Connected | ConnectionState::Connecting => {
                    debug!(state = ?inner.state, "Cache connect ignored, already connected");
                    return Ok(());
                }
                ConnectionState::Disconnected | ConnectionState::ErrorBackoff => {}
            }
            if let Some(pending) = inner.reconnect.take() {
                pending.abort();
            }
            inner.state = ConnectionState::Connecting;
            inner.epoch
        };

        let endpoint = &self.shared.endpoint;
        info!(
            backend = self.shared.backend.name(),
            host = %endpoint.host,
            port = endpoint.port,
            "Connecting cache client"
        );

        let timeout = self.shared.settings.operation_timeout;
        let opened = match tokio::time::timeout(timeout, self.shared.backend.open(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(timeout)),
        };

        let mut inner = self.shared.inner.lock().await;
        if inner.epoch != epoch {
            debug!("Cache disconnected while connecting, discarding connection");
            return Ok(());
        }

        match opened {
            Ok(conn) => {
                inner.next_connection_id += 1;
                inner.connection = Some(ActiveConnection {
                    id: inner.next_connection_id,
                    conn,
                    timeouts: Arc::new(AtomicU32::new(0)),
                });
                inner.state = ConnectionState::Connected;
                info!("Cache connection ready");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Failed to connect cache client, check that the cache server is running");
                self.enter_backoff(&mut inner);
                Err(err)
            }
        }
    }

    /// Closes the connection and cancels any pending reconnect. Idempotent.
    pub async fn disconnect(&self) {
        let mut inner = self.shared.inner.lock().await;
        if let Some(pending) = inner.reconnect.take() {
            pending.abort();
        }
        inner.epoch += 1;
        let had_connection = inner.connection.take().is_some();
        inner.state = ConnectionState::Disconnected;

        if had_connection {
            info!("Cache client disconnected");
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.inner.lock().await.state
    }

    /// Number of automatic reconnect attempts made so far.
    pub fn reconnect_attempts(&self) -> u64 {
        self.shared.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn liveness_key(&self) -> &str {
        &self.shared.settings.liveness_key
    }

    /// Drops the connection and arms the reconnect timer if none is pending.
    fn enter_backoff(&self, inner: &mut GatewayInner) {
        inner.connection = None;
        inner.state = ConnectionState::ErrorBackoff;

        if inner.reconnect.is_none() {
            let delay = self.shared.settings.reconnect_backoff;
            warn!("Attempting cache reconnection in {}s", delay.as_secs());

            let gateway = self.clone();
            let epoch = inner.epoch;
            inner.reconnect = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                gateway.reconnect(epoch).await;
            }));
        }
    }

    async fn reconnect(&self, epoch: u64) {
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.epoch != epoch || inner.state != ConnectionState::ErrorBackoff {
                return;
            }
            // The timer is this task; clear it so `connect` does not abort us.
            inner.reconnect = None;
            inner.state = ConnectionState::Disconnected;
        }
        self.shared.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
        // Failures re-enter the backoff inside `connect`.
        let _ = self.connect().await;
    }

    // == Command Plumbing ==
    async fn run<T, F, Fut>(&self, command: &'static str, call: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn CacheConnection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (id, conn, timeouts) = {
            let inner = self.shared.inner.lock().await;
            match &inner.connection {
                Some(active) => (active.id, active.conn.clone(), active.timeouts.clone()),
                None => return Err(CacheError::NotConnected),
            }
        };

        let timeout = self.shared.settings.operation_timeout;
        let result = match tokio::time::timeout(timeout, call(conn)).await {
            Ok(result) => {
                timeouts.store(0, Ordering::Relaxed);
                result
            }
            Err(_) => Err(CacheError::Timeout(timeout)),
        };

        match &result {
            Err(err) if err.is_connection_error() => {
                self.on_connection_error(id, command, err).await;
            }
            Err(err @ CacheError::Timeout(_)) => {
                // A half-open link never errors, it only stops answering
                let streak = timeouts.fetch_add(1, Ordering::Relaxed) + 1;
                if streak >= MAX_CONSECUTIVE_TIMEOUTS {
                    self.on_connection_error(id, command, err).await;
                } else {
                    warn!(command, streak, error = %err, "Cache command timed out");
                }
            }
            Err(err) => debug!(command, error = %err, "Cache command failed"),
            Ok(_) => {}
        }
        result
    }

    async fn on_connection_error(&self, id: u64, command: &'static str, err: &CacheError) {
        let mut inner = self.shared.inner.lock().await;
        let current = inner.connection.as_ref().is_some_and(|active| active.id == id);
        if current {
            error!(command, error = %err, "Cache server error, attempting reconnection");
            self.enter_backoff(&mut inner);
        }
    }

    // == Key/Value ==
    /// JSON encodes `value` and stores it, with an expiry when `ttl` is given.
    ///
    /// The expiry is applied in whole seconds, rounded down. An expiry that
    /// rounds down to zero is rejected. Returns false when disconnected or
    /// when the store rejects the write.
    pub async fn set_item<V>(&self, key: &str, value: &V, ttl: Option<Duration>) -> bool
    where
        V: Serialize + ?Sized,
    {
        match self.try_set_item(key, value, ttl).await {
            Ok(()) => true,
            Err(err) => {
                debug!(key, error = %err, "Cache set failed");
                false
            }
        }
    }

    async fn try_set_item<V>(&self, key: &str, value: &V, ttl: Option<Duration>) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let encoded = serde_json::to_string(value)?;
        let ttl_seconds = match ttl.map(|ttl| ttl.as_secs()) {
            Some(0) => {
                return Err(CacheError::InvalidExpiry(format!(
                    "{:?} rounds down to zero seconds",
                    ttl.unwrap_or_default()
                )))
            }
            other => other,
        };
        self.run("set", |conn| async move {
            conn.set(key, encoded, ttl_seconds).await
        })
        .await
    }

    /// Reads a key, telling apart a missing key, a missing connection and a
    /// failed read.
    pub async fn lookup(&self, key: &str) -> Lookup {
        match self.run("get", |conn| async move { conn.get(key).await }).await {
            Ok(Some(value)) => Lookup::Found(value),
            Ok(None) => Lookup::NotFound,
            Err(CacheError::NotConnected) => Lookup::Disconnected,
            Err(err) if err.is_connection_error() => Lookup::Disconnected,
            Err(_) => Lookup::Failed,
        }
    }

    /// Returns the stored (JSON encoded) value, or None when the key is
    /// missing or the cache cannot be read.
    pub async fn get_item(&self, key: &str) -> Option<String> {
        self.lookup(key).await.into_option()
    }

    // == Lists ==
    /// JSON encodes `value` and appends it to the tail of a list.
    pub async fn push_item<V>(&self, key: &str, value: &V) -> bool
    where
        V: Serialize + ?Sized,
    {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                debug!(key, error = %err, "Cache push failed to encode value");
                return false;
            }
        };
        self.run("rpush", |conn| async move { conn.rpush(key, encoded).await })
            .await
            .is_ok()
    }

    /// Inclusive range of list elements; empty when absent or disconnected.
    pub async fn list_range(&self, key: &str, start: isize, stop: isize) -> Vec<String> {
        self.try_list_range(key, start, stop)
            .await
            .unwrap_or_default()
    }

    /// Like [`list_range`](Self::list_range), but a read that could not be
    /// made is an error instead of an empty list.
    pub async fn try_list_range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        self.run("lrange", |conn| async move {
            conn.lrange(key, start, stop).await
        })
        .await
    }

    /// Keeps only the inclusive range `[start, stop]` of a list.
    ///
    /// `list_trim(key, count, -1)` drops the first `count` elements.
    pub async fn list_trim(&self, key: &str, start: isize, stop: isize) -> bool {
        self.run("ltrim", |conn| async move {
            conn.ltrim(key, start, stop).await
        })
        .await
        .is_ok()
    }

    // == Server Info ==
    /// `INFO` report of the cache server as `key -> value` pairs.
    pub async fn server_info(&self) -> Option<HashMap<String, String>> {
        self.run("info", |conn| async move { conn.info().await })
            .await
            .ok()
            .map(|report| parse_info(&report))
    }

    // == Liveness ==
    /// Liveness of the heartbeat writer, with an unreachable cache reported
    /// separately from a lapsed record.
    pub async fn liveness(&self) -> Liveness {
        match self.lookup(&self.shared.settings.liveness_key).await {
            Lookup::Found(_) => Liveness::Alive,
            Lookup::NotFound => Liveness::Absent,
            Lookup::Disconnected | Lookup::Failed => Liveness::CacheUnreachable,
        }
    }

    /// True only when the liveness record can be read. An unreachable cache
    /// and a dead heartbeat writer both read as false.
    pub async fn is_live(&self) -> bool {
        self.liveness().await == Liveness::Alive
    }
}

impl std::fmt::Debug for CacheGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGateway")
            .field("backend", &self.shared.backend.name())
            .field("endpoint", &self.shared.endpoint)
            .finish()
    }
}

/// Splits an `INFO` report into `key -> value`, skipping section headers.
fn parse_info(report: &str) -> HashMap<String, String> {
    report
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use tokio::time::sleep;

    use crate::cache::MemoryBackend;

    const BACKOFF: Duration = Duration::from_secs(60);

    fn gateway_over(backend: &MemoryBackend) -> CacheGateway {
        CacheGateway::new(
            Arc::new(backend.clone()),
            CacheEndpoint::new("127.0.0.1", 6379, None),
            GatewaySettings {
                reconnect_backoff: BACKOFF,
                operation_timeout: Duration::from_secs(5),
                liveness_key: "cache_manager_active".to_string(),
            },
        )
    }

    /// Accepts connections whose commands never answer while `stalled` is set.
    #[derive(Clone, Default)]
    struct StallingBackend {
        stalled: Arc<AtomicBool>,
        opens: Arc<AtomicU64>,
    }

    struct StallingConnection {
        stalled: Arc<AtomicBool>,
    }

    impl StallingConnection {
        async fn answer(&self) {
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
        }
    }

    #[async_trait]
    impl CacheBackend for StallingBackend {
        async fn open(&self, _endpoint: &CacheEndpoint) -> Result<Arc<dyn CacheConnection>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StallingConnection {
                stalled: self.stalled.clone(),
            }))
        }

        fn name(&self) -> &'static str {
            "stalling"
        }
    }

    #[async_trait]
    impl CacheConnection for StallingConnection {
        async fn set(&self, _key: &str, _value: String, _ttl_seconds: Option<u64>) -> Result<()> {
            self.answer().await;
            Ok(())
        }

        async fn get(&self, _key: &str) -> Result<Option<String>> {
            self.answer().await;
            Ok(None)
        }

        async fn rpush(&self, _key: &str, _value: String) -> Result<()> {
            self.answer().await;
            Ok(())
        }

        async fn lrange(&self, _key: &str, _start: isize, _stop: isize) -> Result<Vec<String>> {
            self.answer().await;
            Ok(Vec::new())
        }

        async fn ltrim(&self, _key: &str, _start: isize, _stop: isize) -> Result<()> {
            self.answer().await;
            Ok(())
        }

        async fn info(&self) -> Result<String> {
            self.answer().await;
            Ok(String::new())
        }
    }

    fn stalling_gateway(backend: &StallingBackend) -> CacheGateway {
        CacheGateway::new(
            Arc::new(backend.clone()),
            CacheEndpoint::new("127.0.0.1", 6379, None),
            GatewaySettings {
                reconnect_backoff: BACKOFF,
                operation_timeout: Duration::from_secs(5),
                liveness_key: "cache_manager_active".to_string(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_idempotent() {
        let backend = MemoryBackend::new();
        let gateway = gateway_over(&backend);

        gateway.connect().await.unwrap();
        gateway.connect().await.unwrap();

        assert_eq!(gateway.state().await, ConnectionState::Connected);
        assert_eq!(backend.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_reads_are_absent() {
        let gateway = gateway_over(&MemoryBackend::new());

        assert!(!gateway.set_item("key", &1, None).await);
        assert_eq!(gateway.get_item("key").await, None);
        assert_eq!(gateway.lookup("key").await, Lookup::Disconnected);
        assert!(gateway.list_range("queue", 0, -1).await.is_empty());
        assert!(!gateway.list_trim("queue", 1, -1).await);
        assert!(gateway.server_info().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_item_json_encodes_value() {
        let backend = MemoryBackend::new();
        let gateway = gateway_over(&backend);
        gateway.connect().await.unwrap();

        assert!(gateway.set_item("flag", &true, None).await);
        assert_eq!(gateway.get_item("flag").await.as_deref(), Some("true"));
        assert_eq!(gateway.lookup("missing").await, Lookup::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_is_floored_to_seconds() {
        let gateway = gateway_over(&MemoryBackend::new());
        gateway.connect().await.unwrap();

        assert!(gateway.set_item("k", &1, Some(Duration::from_millis(1_999))).await);
        sleep(Duration::from_millis(1_000)).await;
        assert_eq!(gateway.get_item("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_second_ttl_is_rejected() {
        let gateway = gateway_over(&MemoryBackend::new());
        gateway.connect().await.unwrap();

        assert!(!gateway.set_item("k", &1, Some(Duration::from_millis(900))).await);
        assert_eq!(gateway.get_item("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_range_and_trim() {
        let gateway = gateway_over(&MemoryBackend::new());
        gateway.connect().await.unwrap();

        for record in ["r1", "r2", "r3"] {
            assert!(gateway.push_item("queue", record).await);
        }
        let batch = gateway.list_range("queue", 0, 1).await;
        assert_eq!(batch, vec!["\"r1\"", "\"r2\""]);

        assert!(gateway.list_trim("queue", batch.len() as isize, -1).await);
        assert_eq!(gateway.list_range("queue", 0, -1).await, vec!["\"r3\""]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_connection_error() {
        let backend = MemoryBackend::new();
        let gateway = gateway_over(&backend);
        gateway.connect().await.unwrap();

        backend.set_reachable(false);
        assert_eq!(gateway.lookup("key").await, Lookup::Disconnected);
        assert_eq!(gateway.state().await, ConnectionState::ErrorBackoff);

        backend.set_reachable(true);
        sleep(BACKOFF + Duration::from_millis(1)).await;

        assert_eq!(gateway.state().await, ConnectionState::Connected);
        assert_eq!(gateway.reconnect_attempts(), 1);
        assert!(gateway.set_item("key", &1, None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reconnect_keeps_retrying() {
        let backend = MemoryBackend::new();
        let gateway = gateway_over(&backend);

        backend.set_reachable(false);
        assert!(gateway.connect().await.is_err());
        assert_eq!(gateway.state().await, ConnectionState::ErrorBackoff);

        sleep(BACKOFF + Duration::from_millis(1)).await;
        assert_eq!(gateway.state().await, ConnectionState::ErrorBackoff);
        assert_eq!(gateway.reconnect_attempts(), 1);

        backend.set_reachable(true);
        sleep(BACKOFF).await;
        assert_eq!(gateway.state().await, ConnectionState::Connected);
        assert_eq!(gateway.reconnect_attempts(), 2);
        assert_eq!(backend.open_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_errors_arm_single_timer() {
        let backend = MemoryBackend::new();
        let gateway = gateway_over(&backend);
        gateway.connect().await.unwrap();

        backend.set_reachable(false);
        let _ = gateway.get_item("a").await;
        let _ = gateway.get_item("b").await;
        backend.set_reachable(true);

        sleep(BACKOFF * 3).await;
        assert_eq!(gateway.reconnect_attempts(), 1);
        assert_eq!(backend.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let backend = MemoryBackend::new();
        let gateway = gateway_over(&backend);

        backend.set_reachable(false);
        assert!(gateway.connect().await.is_err());
        backend.set_reachable(true);

        gateway.disconnect().await;
        gateway.disconnect().await;
        sleep(BACKOFF * 2).await;

        assert_eq!(gateway.state().await, ConnectionState::Disconnected);
        assert_eq!(gateway.reconnect_attempts(), 0);
        assert_eq!(backend.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_commands_recycle_connection() {
        let backend = StallingBackend::default();
        let gateway = stalling_gateway(&backend);
        gateway.connect().await.unwrap();

        backend.stalled.store(true, Ordering::SeqCst);
        for _ in 0..MAX_CONSECUTIVE_TIMEOUTS - 1 {
            assert!(!gateway.set_item("key", &1, None).await);
            assert_eq!(gateway.state().await, ConnectionState::Connected);
        }
        assert!(!gateway.set_item("key", &1, None).await);
        assert_eq!(gateway.state().await, ConnectionState::ErrorBackoff);

        backend.stalled.store(false, Ordering::SeqCst);
        sleep(BACKOFF + Duration::from_millis(1)).await;

        assert_eq!(gateway.state().await, ConnectionState::Connected);
        assert_eq!(gateway.reconnect_attempts(), 1);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 2);
        assert!(gateway.set_item("key", &1, None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answered_command_resets_timeout_streak() {
        let backend = StallingBackend::default();
        let gateway = stalling_gateway(&backend);
        gateway.connect().await.unwrap();

        for _ in 0..3 {
            backend.stalled.store(true, Ordering::SeqCst);
            for _ in 0..MAX_CONSECUTIVE_TIMEOUTS - 1 {
                assert_eq!(gateway.lookup("key").await, Lookup::Failed);
            }
            backend.stalled.store(false, Ordering::SeqCst);
            assert_eq!(gateway.lookup("key").await, Lookup::NotFound);
        }

        assert_eq!(gateway.state().await, ConnectionState::Connected);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_splits_causes() {
        let backend = MemoryBackend::new();
        let gateway = gateway_over(&backend);

        assert_eq!(gateway.liveness().await, Liveness::CacheUnreachable);
        assert!(!gateway.is_live().await);

        gateway.connect().await.unwrap();
        assert_eq!(gateway.liveness().await, Liveness::Absent);
        assert!(!gateway.is_live().await);

        assert!(gateway
            .set_item("cache_manager_active", &true, Some(Duration::from_secs(10)))
            .await);
        assert_eq!(gateway.liveness().await, Liveness::Alive);
        assert!(gateway.is_live().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_info_parses_pairs() {
        let gateway = gateway_over(&MemoryBackend::new());
        gateway.connect().await.unwrap();

        let info = gateway.server_info().await.unwrap();
        assert_eq!(info.get("redis_version").map(String::as_str), Some("memory"));
        assert!(!info.contains_key("# Server"));
    }

    #[test]
    fn test_parse_info_keeps_colons_in_values() {
        let info = parse_info("# Clients\r\nconnected_clients:2\r\nexecutable:/usr/bin:redis\r\n");
        assert_eq!(info.get("connected_clients").map(String::as_str), Some("2"));
        assert_eq!(info.get("executable").map(String::as_str), Some("/usr/bin:redis"));
        assert_eq!(info.len(), 2);
    }
}

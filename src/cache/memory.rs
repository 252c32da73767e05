//! In-Memory Cache Backend
//!
//! A process-local store with string keys, per-key TTL and lists. It follows
//! Redis semantics for the commands the gateway uses, so it stands in for a
//! Redis server in local runs and in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{CacheBackend, CacheConnection, CacheEndpoint, CacheEntry};
use crate::error::{CacheError, Result};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

// == Memory Store ==
/// Key-value and list storage with lazy TTL expiration.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// String values
    entries: HashMap<String, CacheEntry>,
    /// Lists, head at the front
    lists: HashMap<String, VecDeque<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Stores a string value, replacing any value of any type under `key`.
    pub fn set(&mut self, key: &str, value: String, ttl_seconds: Option<u64>) {
        self.lists.remove(key);
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl_seconds));
    }

    // == Get ==
    /// Retrieves a string value. Expired entries are removed and read as absent.
    pub fn get(&mut self, key: &str) -> Result<Option<String>> {
        if self.lists.contains_key(key) {
            return Err(CacheError::Command(WRONG_TYPE.to_string()));
        }
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    /// True when `key` holds an unexpired string value.
    fn holds_string(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // == Push ==
    /// Appends to the tail of a list, returning the new length.
    pub fn rpush(&mut self, key: &str, value: String) -> Result<usize> {
        if self.holds_string(key) {
            return Err(CacheError::Command(WRONG_TYPE.to_string()));
        }
        let list = self.lists.entry(key.to_string()).or_default();
        list.push_back(value);
        Ok(list.len())
    }

    // == Range ==
    /// Returns the inclusive range `[start, stop]`, negative indices counting
    /// from the tail.
    pub fn lrange(&mut self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        if self.holds_string(key) {
            return Err(CacheError::Command(WRONG_TYPE.to_string()));
        }
        let Some(list) = self.lists.get(key) else {
            return Ok(Vec::new());
        };
        Ok(match resolve_range(list.len(), start, stop) {
            Some((first, last)) => list.range(first..=last).cloned().collect(),
            None => Vec::new(),
        })
    }

    // == Trim ==
    /// Keeps only the inclusive range `[start, stop]`; an emptied list is removed.
    pub fn ltrim(&mut self, key: &str, start: isize, stop: isize) -> Result<()> {
        if self.holds_string(key) {
            return Err(CacheError::Command(WRONG_TYPE.to_string()));
        }
        let Some(list) = self.lists.get_mut(key) else {
            return Ok(());
        };
        match resolve_range(list.len(), start, stop) {
            Some((first, last)) => {
                list.truncate(last + 1);
                list.drain(..first);
            }
            None => list.clear(),
        }
        if list.is_empty() {
            self.lists.remove(key);
        }
        Ok(())
    }

    // == Length ==
    /// Returns the length of a list, zero when absent.
    pub fn llen(&self, key: &str) -> usize {
        self.lists.get(key).map_or(0, VecDeque::len)
    }

    // == Cleanup Expired ==
    /// Removes all expired string entries, returning how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    /// Number of live keys of either type.
    pub fn len(&self) -> usize {
        self.entries.len() + self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// INFO style report, one `key:value` per line. Expired keys are purged
    /// first so the keyspace count only covers live keys.
    pub fn info(&mut self) -> String {
        let purged = self.cleanup_expired();
        if purged > 0 {
            debug!(purged, "Purged expired memory cache entries");
        }
        format!(
            "# Server\r\nredis_version:memory\r\nredis_mode:standalone\r\n# Keyspace\r\nkeys:{}\r\n",
            self.len()
        )
    }
}

/// Maps Redis style inclusive indices onto `[first, last]` of a list of `len`.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

// == Memory Backend ==
struct MemoryShared {
    store: Mutex<MemoryStore>,
    reachable: AtomicBool,
    opens: AtomicU64,
}

/// Backend handing out connections to one shared [`MemoryStore`].
///
/// Clones share the same store. Marking the backend unreachable makes new
/// connections fail and commands on existing ones fail with a connection
/// error, which is how outages are simulated.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<MemoryShared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MemoryShared {
                store: Mutex::new(MemoryStore::new()),
                reachable: AtomicBool::new(true),
                opens: AtomicU64::new(0),
            }),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of connection attempts made against this backend.
    pub fn open_count(&self) -> u64 {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Runs `f` against the store directly, bypassing reachability.
    pub async fn with_store<T>(&self, f: impl FnOnce(&mut MemoryStore) -> T) -> T {
        let mut store = self.shared.store.lock().await;
        f(&mut store)
    }

    /// Full contents of a list.
    pub async fn list(&self, key: &str) -> Vec<String> {
        self.with_store(|store| store.lrange(key, 0, -1).unwrap_or_default())
            .await
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("reachable", &self.shared.reachable.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn open(&self, endpoint: &CacheEndpoint) -> Result<Arc<dyn CacheConnection>> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        if !self.shared.reachable.load(Ordering::SeqCst) {
            return Err(CacheError::Connection(format!(
                "connection refused by {}:{}",
                endpoint.host, endpoint.port
            )));
        }
        Ok(Arc::new(MemoryConnection {
            shared: self.shared.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryConnection {
    shared: Arc<MemoryShared>,
}

impl MemoryConnection {
    async fn store(&self) -> Result<tokio::sync::MutexGuard<'_, MemoryStore>> {
        if !self.shared.reachable.load(Ordering::SeqCst) {
            return Err(CacheError::Connection("connection reset".to_string()));
        }
        Ok(self.shared.store.lock().await)
    }
}

#[async_trait]
impl CacheConnection for MemoryConnection {
    async fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) -> Result<()> {
        self.store().await?.set(key, value, ttl_seconds);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.store().await?.get(key)
    }

    async fn rpush(&self, key: &str, value: String) -> Result<()> {
        self.store().await?.rpush(key, value).map(|_| ())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        self.store().await?.lrange(key, start, stop)
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        self.store().await?.ltrim(key, start, stop)
    }

    async fn info(&self) -> Result<String> {
        Ok(self.store().await?.info())
    }
}

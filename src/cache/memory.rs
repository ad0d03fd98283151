//! Bounded in-memory TTL cache.
//!
//! [`TtlCache`] is a key/value store with per-entry time-to-live, a maximum
//! key count, and hit/miss/size statistics.
//!
//! # Expiry
//!
//! Expiry is push-based: every entry with a TTL gets a one-shot tokio task
//! that removes it when the TTL elapses. Replacing, deleting, or re-timing
//! an entry aborts its task. Reads re-check `created_at + ttl` as well, so
//! an entry whose task has not run yet is never returned; this also makes
//! the cache correct when used outside a tokio runtime (no tasks are
//! scheduled then, and expiry is purely lazy).
//!
//! An optional periodic sweep ([`CacheConfig::check_period`]) removes
//! expired entries in bulk. It is a maintenance hook only; the per-entry
//! tasks and read-time checks are what guarantee correctness.
//!
//! # Eviction
//!
//! When the cache holds `max_keys` entries and a *new* key is set, the
//! earliest-inserted live entry is evicted. This is insertion order (FIFO),
//! not LRU: reads do not refresh an entry's position. Re-setting an existing
//! key re-inserts it at the back.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;

/// Configuration for a [`TtlCache`].
///
/// ```rust
/// # use larder::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_keys(1_000)
///     .std_ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries. `None` means unbounded. Default: 500.
    pub max_keys: Option<usize>,
    /// TTL applied by [`TtlCache::set`]. `Duration::ZERO` means entries
    /// never expire. Default: 1 hour.
    pub std_ttl: Duration,
    /// Interval of the background sweep, if any. Default: 10 minutes.
    pub check_period: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_keys: Some(500),
            std_ttl: Duration::from_secs(3600),
            check_period: Some(Duration::from_secs(600)),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn max_keys(mut self, n: usize) -> Self {
        self.max_keys = Some(n);
        self
    }

    /// Remove the entry limit.
    pub fn unbounded(mut self) -> Self {
        self.max_keys = None;
        self
    }

    /// Set the standard TTL (`Duration::ZERO` disables expiry).
    pub fn std_ttl(mut self, ttl: Duration) -> Self {
        self.std_ttl = ttl;
        self
    }

    /// Set the background sweep interval.
    pub fn check_period(mut self, period: Duration) -> Self {
        self.check_period = Some(period);
        self
    }

    /// Disable the background sweep.
    pub fn no_check_period(mut self) -> Self {
        self.check_period = None;
        self
    }
}

/// Cache counters.
///
/// `ksize` and `vsize` are approximations (key length and JSON-serialized
/// value length) for observability; eviction never looks at them.
///
/// `hits` counts memory-tier hits. `durable_hits` counts reads the memory
/// tier missed but the durable tier served; it stays 0 for a bare
/// [`TtlCache`]. `misses` counts reads no tier could serve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    pub keys: u64,
    pub ksize: u64,
    pub vsize: u64,
}

impl CacheStats {
    /// Share of reads served by any tier, or 0.0 before any access.
    pub fn hit_ratio(&self) -> f64 {
        let served = self.hits + self.durable_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

/// Remaining lifetime of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    After(Duration),
}

struct Entry<V> {
    value: Arc<V>,
    created_at: Instant,
    ttl: Option<Duration>,
    seq: u64,
    ksize: u64,
    vsize: u64,
    timer: Option<AbortHandle>,
}

impl<V> Entry<V> {
    /// `None` when the entry never expires, including TTLs too large to
    /// represent as an instant.
    fn deadline(&self) -> Option<Instant> {
        self.ttl.and_then(|ttl| self.created_at.checked_add(ttl))
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Insertion sequence → key, oldest first.
    order: BTreeMap<u64, String>,
    next_seq: u64,
    stats: CacheStats,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            stats: CacheStats::default(),
        }
    }

    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let mut entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        entry.cancel_timer();
        self.stats.keys = self.stats.keys.saturating_sub(1);
        self.stats.ksize = self.stats.ksize.saturating_sub(entry.ksize);
        self.stats.vsize = self.stats.vsize.saturating_sub(entry.vsize);
        Some(entry)
    }

    /// Remove `key` if it has expired. Returns whether it was removed.
    fn expire_if_stale(&mut self, key: &str, now: Instant) -> bool {
        let stale = self.entries.get(key).is_some_and(|e| e.is_expired(now));
        if stale {
            self.remove(key);
            debug!(key, "cache entry expired");
        }
        stale
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            self.remove(key);
        }
        stale.len()
    }

    fn clear(&mut self) {
        for entry in self.entries.values_mut() {
            entry.cancel_timer();
        }
        self.entries.clear();
        self.order.clear();
        self.stats = CacheStats::default();
    }
}

fn lock<V>(inner: &Mutex<Inner<V>>) -> MutexGuard<'_, Inner<V>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded key/value cache with per-entry TTL. See module docs.
///
/// Values are stored behind `Arc`; [`get`](Self::get) hands out an owned
/// clone, so mutating a returned value never affects the cache.
/// [`get_shared`](Self::get_shared) skips the clone.
pub struct TtlCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
    config: CacheConfig,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl<V> TtlCache<V>
where
    V: Serialize + Send + Sync + 'static,
{
    /// Create a cache. Starts the periodic sweep when `check_period` is set
    /// and a tokio runtime is available.
    pub fn new(config: CacheConfig) -> Self {
        let inner = Arc::new(Mutex::new(Inner::new()));
        let maintenance = config
            .check_period
            .filter(|period| !period.is_zero())
            .and_then(|period| spawn_maintenance(Arc::downgrade(&inner), period));
        Self {
            inner,
            config,
            maintenance: Mutex::new(maintenance),
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Insert or replace `key` using the standard TTL.
    pub fn set(&self, key: impl Into<String>, value: V) -> bool {
        self.set_with_ttl(key, value, self.config.std_ttl)
    }

    /// Insert or replace `key` with an explicit TTL (`Duration::ZERO` never
    /// expires).
    ///
    /// Returns `false` only when the cache is configured with
    /// `max_keys == 0` and can hold nothing.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) -> bool {
        if self.config.max_keys == Some(0) {
            return false;
        }
        let key = key.into();
        let ksize = key.len() as u64;
        let vsize = serde_json::to_vec(&value)
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0);
        let ttl = (!ttl.is_zero()).then_some(ttl);

        let mut inner = lock(&self.inner);
        let replaced = inner.remove(&key).is_some();
        if !replaced && let Some(max) = self.config.max_keys {
            if inner.entries.len() >= max {
                inner.purge_expired(Instant::now());
            }
            while inner.entries.len() >= max {
                let Some((_, oldest)) = inner.order.pop_first() else {
                    break;
                };
                // order entry already popped; remove() tolerates the miss
                inner.remove(&oldest);
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
                debug!(key = %oldest, "evicted oldest cache entry");
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let created_at = Instant::now();
        let timer = ttl
            .and_then(|ttl| created_at.checked_add(ttl))
            .and_then(|deadline| {
                schedule_expiry(Arc::downgrade(&self.inner), key.clone(), seq, deadline)
            });

        inner.order.insert(seq, key.clone());
        inner.stats.keys += 1;
        inner.stats.ksize += ksize;
        inner.stats.vsize += vsize;
        inner.entries.insert(
            key,
            Entry {
                value: Arc::new(value),
                created_at,
                ttl,
                seq,
                ksize,
                vsize,
                timer,
            },
        );
        true
    }

    /// Look up `key`, returning a shared handle to the value.
    ///
    /// Counts a hit or a miss.
    pub fn get_shared(&self, key: &str) -> Option<Arc<V>> {
        let mut inner = lock(&self.inner);
        inner.expire_if_stale(key, Instant::now());
        let value = inner.entries.get(key).map(|e| Arc::clone(&e.value));
        if value.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        value
    }

    /// Remove `key`. Returns the number of entries removed (0 or 1).
    pub fn del(&self, key: &str) -> usize {
        usize::from(lock(&self.inner).remove(key).is_some())
    }

    /// Whether `key` is present and live. Does not touch hit/miss counters.
    pub fn has(&self, key: &str) -> bool {
        let mut inner = lock(&self.inner);
        inner.expire_if_stale(key, Instant::now());
        inner.entries.contains_key(key)
    }

    /// Snapshot of the live keys, oldest insertion first.
    pub fn keys(&self) -> Vec<String> {
        let mut inner = lock(&self.inner);
        inner.purge_expired(Instant::now());
        inner.order.values().cloned().collect()
    }

    /// Replace the expiry of an existing entry, counting from now.
    ///
    /// Returns `false` if `key` is absent.
    pub fn ttl(&self, key: &str, ttl: Duration) -> bool {
        let mut inner = lock(&self.inner);
        let now = Instant::now();
        inner.expire_if_stale(key, now);
        let Some(entry) = inner.entries.get_mut(key) else {
            return false;
        };
        entry.cancel_timer();
        entry.created_at = now;
        entry.ttl = (!ttl.is_zero()).then_some(ttl);
        let seq = entry.seq;
        entry.timer = entry.deadline().and_then(|deadline| {
            schedule_expiry(Arc::downgrade(&self.inner), key.to_string(), seq, deadline)
        });
        true
    }

    /// How long `key` has left, or `None` if absent.
    pub fn remaining_ttl(&self, key: &str) -> Option<Expiry> {
        let mut inner = lock(&self.inner);
        let now = Instant::now();
        inner.expire_if_stale(key, now);
        inner
            .entries
            .get(key)
            .map(|entry| match entry.deadline() {
                Some(deadline) => Expiry::After(deadline.saturating_duration_since(now)),
                None => Expiry::Never,
            })
    }

    /// Current counters.
    pub fn get_stats(&self) -> CacheStats {
        lock(&self.inner).stats
    }

    /// Number of entries held, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        lock(&self.inner).purge_expired(Instant::now())
    }

    /// Drop every entry, cancel every timer, and reset the counters.
    pub fn flush_all(&self) {
        lock(&self.inner).clear();
    }

    /// [`flush_all`](Self::flush_all) and stop the periodic sweep.
    pub fn close(&self) {
        self.flush_all();
        let handle = self
            .maintenance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    /// Look up `key`, returning an owned copy of the value.
    ///
    /// Counts a hit or a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_shared(key).map(|v| V::clone(&v))
    }

    /// Batch [`get`](Self::get). Absent keys are omitted from the result.
    pub fn mget<I, K>(&self, keys: I) -> HashMap<String, V>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter()
            .filter_map(|key| {
                let key = key.as_ref();
                self.get(key).map(|value| (key.to_string(), value))
            })
            .collect()
    }
}

impl<V> Drop for TtlCache<V> {
    fn drop(&mut self) {
        if let Ok(mut maintenance) = self.maintenance.lock()
            && let Some(handle) = maintenance.take()
        {
            handle.abort();
        }
        lock(&self.inner).clear();
    }
}

/// Spawn the one-shot expiry task for an entry, if a runtime is available.
fn schedule_expiry<V>(
    inner: Weak<Mutex<Inner<V>>>,
    key: String,
    seq: u64,
    deadline: Instant,
) -> Option<AbortHandle>
where
    V: Send + Sync + 'static,
{
    let runtime = Handle::try_current().ok()?;
    let task = runtime.spawn(async move {
        tokio::time::sleep_until(deadline).await;
        let Some(strong) = inner.upgrade() else {
            return;
        };
        let mut inner = lock(&strong);
        let due = inner
            .entries
            .get(&key)
            .is_some_and(|e| e.seq == seq && e.is_expired(Instant::now()));
        if due {
            if let Some(entry) = inner.entries.get_mut(&key) {
                // this task is the timer; don't abort ourselves
                entry.timer = None;
            }
            inner.remove(&key);
            debug!(key = %key, "cache entry expired");
        }
    });
    Some(task.abort_handle())
}

fn spawn_maintenance<V>(inner: Weak<Mutex<Inner<V>>>, period: Duration) -> Option<JoinHandle<()>>
where
    V: Send + Sync + 'static,
{
    let runtime = Handle::try_current().ok()?;
    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(strong) = inner.upgrade() else {
                break;
            };
            let purged = lock(&strong).purge_expired(Instant::now());
            if purged > 0 {
                debug!(purged, "periodic cache sweep");
            }
        }
    }))
}

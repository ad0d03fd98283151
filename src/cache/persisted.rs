//! Persisted cache tier.
//!
//! [`PersistedCache`] pairs a [`TtlCache`] (hot path) with a
//! [`DurableStore`] that mirrors every entry as a [`PersistedRecord`]
//! carrying an absolute expiry. Entries survive restarts: records are read
//! back lazily on a memory miss, or in bulk by [`PersistedCache::hydrate`].
//!
//! # Failure semantics
//!
//! The durable medium is best-effort. Any read or write failure, including a
//! corrupt record, is logged and treated as "no persisted entry"; the memory
//! tier keeps working on its own. Nothing here returns an error.
//!
//! # Namespacing
//!
//! Durable keys are `namespace + key`, so several caches can share a store.
//! Per-user isolation belongs in the key itself (see
//! [`derive_scoped_key`](super::derive_scoped_key)).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::memory::{CacheConfig, CacheStats, TtlCache};
use crate::store::DurableStore;
use crate::telemetry;

/// Default namespace prefix for durable cache records.
pub const DEFAULT_NAMESPACE: &str = "larder:cache:";

/// Durable form of a cache entry.
///
/// Timestamps are Unix epoch milliseconds. `expiry_at == None` means the
/// entry never expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRecord<V> {
    pub value: V,
    pub expiry_at: Option<i64>,
    pub created_at: i64,
}

impl<V> PersistedRecord<V> {
    /// Remaining lifetime at `now_ms`: `Some(ZERO)` for never-expiring
    /// records (the memory tier's "no expiry" sentinel), `None` once
    /// expired.
    fn remaining(&self, now_ms: i64) -> Option<Duration> {
        match self.expiry_at {
            None => Some(Duration::ZERO),
            Some(expiry_at) if expiry_at > now_ms => {
                Some(Duration::from_millis((expiry_at - now_ms) as u64))
            }
            Some(_) => None,
        }
    }
}

/// Two-tier cache: memory first, durable store second.
pub struct PersistedCache<V> {
    memory: TtlCache<V>,
    store: Arc<dyn DurableStore>,
    namespace: String,
    durable_hits: AtomicU64,
}

impl<V> PersistedCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a two-tier cache using [`DEFAULT_NAMESPACE`].
    ///
    /// The memory tier starts empty; call [`hydrate`](Self::hydrate) to load
    /// surviving records eagerly.
    pub fn new(config: CacheConfig, store: Arc<dyn DurableStore>) -> Self {
        Self::with_namespace(config, store, DEFAULT_NAMESPACE)
    }

    /// Create a two-tier cache with a custom durable namespace.
    pub fn with_namespace(
        config: CacheConfig,
        store: Arc<dyn DurableStore>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            memory: TtlCache::new(config),
            store,
            namespace: namespace.into(),
            durable_hits: AtomicU64::new(0),
        }
    }

    /// The in-memory tier.
    pub fn memory(&self) -> &TtlCache<V> {
        &self.memory
    }

    /// The durable key for a cache key.
    pub fn durable_key(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }

    /// Start-up scan: drop expired or unreadable records and load the rest
    /// into memory with their remaining TTL. Returns how many were loaded.
    pub fn hydrate(&self) -> usize {
        let durable_keys = match self.store.keys_with_prefix(&self.namespace) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "cache hydration scan failed");
                return 0;
            }
        };
        let now_ms = Utc::now().timestamp_millis();
        let mut loaded = 0;
        for durable_key in durable_keys {
            let Some(key) = durable_key.strip_prefix(&self.namespace) else {
                continue;
            };
            // unreadable records are discarded by read_record
            let Some(record) = self.read_record(&durable_key) else {
                continue;
            };
            match record.remaining(now_ms) {
                Some(ttl) => {
                    self.memory.set_with_ttl(key, record.value, ttl);
                    loaded += 1;
                }
                None => self.remove_durable(&durable_key),
            }
        }
        debug!(namespace = %self.namespace, loaded, "hydrated cache from durable store");
        loaded
    }

    /// Write `value` to both tiers. `Duration::ZERO` never expires.
    pub fn set_cache(&self, key: &str, value: V, ttl: Duration) {
        let now_ms = Utc::now().timestamp_millis();
        let record = PersistedRecord {
            value,
            expiry_at: (!ttl.is_zero()).then(|| {
                now_ms.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
            }),
            created_at: now_ms,
        };
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(e) = self.store.set(&self.durable_key(key), &json) {
                    warn!(key, error = %e, "failed to persist cache entry");
                }
            }
            Err(e) => warn!(key, error = %e, "failed to serialize cache entry"),
        }
        self.memory.set_with_ttl(key, record.value, ttl);
    }

    /// Look up `key` in memory, then in the durable store.
    ///
    /// A live durable record is copied back into memory with its remaining
    /// TTL; an expired one is deleted.
    pub fn get_from_cache(&self, key: &str) -> Option<V> {
        if let Some(value) = self.memory.get(key) {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "memory").increment(1);
            debug!(key, tier = "memory", "cache hit");
            return Some(value);
        }

        let durable_key = self.durable_key(key);
        let Some(record) = self.read_record(&durable_key) else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            debug!(key, "cache miss");
            return None;
        };

        match record.remaining(Utc::now().timestamp_millis()) {
            Some(ttl) => {
                self.memory.set_with_ttl(key, record.value.clone(), ttl);
                self.durable_hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "durable").increment(1);
                debug!(
                    key,
                    tier = "durable",
                    remaining_ms = ttl.as_millis() as u64,
                    "cache hit, rehydrated"
                );
                Some(record.value)
            }
            None => {
                self.remove_durable(&durable_key);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(key, "durable cache record expired");
                None
            }
        }
    }

    /// Remove `key` from both tiers.
    pub fn delete(&self, key: &str) {
        self.memory.del(key);
        self.remove_durable(&self.durable_key(key));
    }

    /// Empty both tiers (only this cache's namespace in the durable store).
    pub fn clear(&self) {
        self.memory.flush_all();
        self.durable_hits.store(0, Ordering::Relaxed);
        match self.store.keys_with_prefix(&self.namespace) {
            Ok(keys) => {
                for durable_key in keys {
                    self.remove_durable(&durable_key);
                }
            }
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "failed to list durable cache entries")
            }
        }
    }

    /// Counters across both tiers.
    ///
    /// A read served by the durable tier is reported under `durable_hits`,
    /// not under `misses`, even though the memory tier missed it.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.memory.get_stats();
        let durable_hits = self.durable_hits.load(Ordering::Relaxed);
        stats.durable_hits = durable_hits;
        stats.misses = stats.misses.saturating_sub(durable_hits);
        stats
    }

    /// Stop background maintenance and drop the memory tier.
    ///
    /// Durable records are kept for the next process.
    pub fn close(&self) {
        self.memory.close();
    }

    fn read_record(&self, durable_key: &str) -> Option<PersistedRecord<V>> {
        let json = match self.store.get(durable_key) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = durable_key, error = %e, "failed to read durable cache entry");
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key = durable_key, error = %e, "corrupt durable cache entry, discarding");
                self.remove_durable(durable_key);
                None
            }
        }
    }

    fn remove_durable(&self, durable_key: &str) {
        if let Err(e) = self.store.remove(durable_key) {
            warn!(key = durable_key, error = %e, "failed to delete durable cache entry");
        }
    }
}

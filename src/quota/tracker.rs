//! Per-credential daily quota bookkeeping.
//!
//! Each credential has a [`QuotaRecord`] counting requests in the current
//! window against a fixed daily limit. Windows end at the next local
//! midnight. Rollover is lazy: [`QuotaTracker::rollover_if_needed`] runs
//! before every credential selection, never on a timer.
//!
//! The whole table is written to the durable store after every mutation
//! and read back at construction. Records loaded with a `reset_at` in the
//! past are kept as loaded and rolled over by the next rollover check.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::DurableStore;
use crate::telemetry;
use crate::{LarderError, Result};

/// Default daily request limit per credential (provider free tier).
pub const DEFAULT_DAILY_LIMIT: u32 = 150;

/// Durable key holding the serialized quota table.
pub const QUOTA_STORAGE_KEY: &str = "larder:quota";

/// One of several interchangeable API credentials.
///
/// The secret is masked in `Debug` and `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential {
    pub id: String,
    secret: String,
}

impl ApiCredential {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    /// The raw secret, for building outbound requests only.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// First four characters of the secret followed by an ellipsis.
    pub fn masked_secret(&self) -> String {
        let prefix: String = self.secret.chars().take(4).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("id", &self.id)
            .field("secret", &self.masked_secret())
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.masked_secret())
    }
}

/// Usage of one credential in the current quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub used: u32,
    pub limit: u32,
    /// Start of the next window (next local midnight).
    pub reset_at: DateTime<Utc>,
}

impl QuotaRecord {
    /// A fresh record for the window containing `now`.
    pub fn fresh(limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            used: 0,
            limit,
            reset_at: next_local_midnight(now),
        }
    }

    /// Requests left in this window.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Whether the window has ended at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.reset_at <= now
    }
}

/// The first instant of the local calendar day after `now`, in UTC.
///
/// Falls back to `now + 24h` when local midnight does not exist (DST gap).
pub fn next_local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    local
        .date_naive()
        .succ_opt()
        .map(|tomorrow| tomorrow.and_time(NaiveTime::MIN))
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now + TimeDelta::days(1))
}

struct QuotaTable {
    /// Credential ids in configuration order.
    order: Vec<String>,
    records: HashMap<String, QuotaRecord>,
}

/// Tracks daily usage for a fixed set of credentials.
pub struct QuotaTracker {
    table: Mutex<QuotaTable>,
    limit: u32,
    store: Option<Arc<dyn DurableStore>>,
}

impl QuotaTracker {
    /// Create a tracker for `ids`, loading persisted state from `store`.
    pub fn new<I, S>(ids: I, limit: u32, store: Option<Arc<dyn DurableStore>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        let mut persisted = store.as_deref().map(load_table).unwrap_or_default();

        let mut order = Vec::new();
        let mut records = HashMap::new();
        for id in ids {
            let id = id.into();
            if records.contains_key(&id) {
                continue;
            }
            let record = match persisted.remove(&id) {
                Some(stored) => QuotaRecord { limit, ..stored },
                None => QuotaRecord::fresh(limit, now),
            };
            records.insert(id.clone(), record);
            order.push(id);
        }

        let tracker = Self {
            table: Mutex::new(QuotaTable { order, records }),
            limit,
            store,
        };
        tracker.persist(&tracker.lock());
        tracker
    }

    /// Create a tracker for the ids of `credentials`.
    pub fn for_credentials(
        credentials: &[ApiCredential],
        limit: u32,
        store: Option<Arc<dyn DurableStore>>,
    ) -> Self {
        Self::new(credentials.iter().map(|c| c.id.clone()), limit, store)
    }

    /// The configured per-window limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Current record for `id`.
    pub fn record(&self, id: &str) -> Option<QuotaRecord> {
        self.lock().records.get(id).copied()
    }

    /// Requests left for `id` in this window.
    pub fn remaining(&self, id: &str) -> Option<u32> {
        self.record(id).map(|r| r.remaining())
    }

    /// Whether `id` has quota left.
    pub fn is_available(&self, id: &str) -> bool {
        self.record(id).is_some_and(|r| !r.is_exhausted())
    }

    /// All records, in configuration order.
    pub fn snapshot(&self) -> Vec<(String, QuotaRecord)> {
        let table = self.lock();
        table
            .order
            .iter()
            .filter_map(|id| table.records.get(id).map(|r| (id.clone(), *r)))
            .collect()
    }

    /// Count one request sent with `id`.
    ///
    /// Always increments, even past the limit: the request was sent and the
    /// provider counted it.
    pub fn record_usage(&self, id: &str) -> Result<QuotaRecord> {
        let mut table = self.lock();
        let record = table
            .records
            .get_mut(id)
            .ok_or_else(|| LarderError::UnknownCredential(id.to_string()))?;
        let was_exhausted = record.is_exhausted();
        record.used = record.used.saturating_add(1);
        let updated = *record;
        if !was_exhausted && updated.is_exhausted() {
            metrics::counter!(telemetry::CREDENTIALS_EXHAUSTED_TOTAL).increment(1);
            info!(credential = id, limit = updated.limit, "credential quota used up");
        }
        self.persist(&table);
        Ok(updated)
    }

    /// Mark `id` as exhausted for the rest of the window (`used = limit`).
    ///
    /// Used when the provider reports the quota gone even though local
    /// counting says otherwise. Idempotent.
    pub fn force_exhaust(&self, id: &str) -> Result<QuotaRecord> {
        let mut table = self.lock();
        let record = table
            .records
            .get_mut(id)
            .ok_or_else(|| LarderError::UnknownCredential(id.to_string()))?;
        let was_exhausted = record.is_exhausted();
        record.used = record.limit;
        let updated = *record;
        if !was_exhausted {
            metrics::counter!(telemetry::CREDENTIALS_EXHAUSTED_TOTAL).increment(1);
            info!(credential = id, "credential force-exhausted after provider rejection");
        }
        self.persist(&table);
        Ok(updated)
    }

    /// Start a new window for every credential whose window has ended.
    ///
    /// Returns the number of records rolled over.
    pub fn rollover_if_needed(&self) -> usize {
        let now = Utc::now();
        let mut table = self.lock();
        let limit = self.limit;
        let mut rolled = 0;
        for (id, record) in table.records.iter_mut() {
            if record.is_due(now) {
                debug!(credential = %id, used = record.used, "quota window rolled over");
                *record = QuotaRecord::fresh(limit, now);
                rolled += 1;
            }
        }
        if rolled > 0 {
            info!(rolled, "quota windows reset");
            self.persist(&table);
        }
        rolled
    }

    fn lock(&self) -> MutexGuard<'_, QuotaTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, table: &QuotaTable) {
        let Some(store) = &self.store else {
            return;
        };
        let ordered: BTreeMap<&str, &QuotaRecord> = table
            .records
            .iter()
            .map(|(id, record)| (id.as_str(), record))
            .collect();
        match serde_json::to_string(&ordered) {
            Ok(json) => {
                if let Err(e) = store.set(QUOTA_STORAGE_KEY, &json) {
                    warn!(error = %e, "failed to persist quota table");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize quota table"),
        }
    }
}

fn load_table(store: &dyn DurableStore) -> HashMap<String, QuotaRecord> {
    let json = match store.get(QUOTA_STORAGE_KEY) {
        Ok(Some(json)) => json,
        Ok(None) => return HashMap::new(),
        Err(e) => {
            warn!(error = %e, "failed to read persisted quota table");
            return HashMap::new();
        }
    };
    serde_json::from_str(&json).unwrap_or_else(|e| {
        warn!(error = %e, "corrupt persisted quota table, starting fresh");
        HashMap::new()
    })
}

//! Durable key/value storage backing the persisted cache tier and the
//! quota table.
//!
//! A [`DurableStore`] is a plain string-keyed get/set/remove interface with
//! no TTL semantics of its own; expiry is layered on top by
//! [`PersistedCache`](crate::cache::PersistedCache). Stores may have a hard
//! size ceiling, so writes can fail with [`StoreError::CapacityExceeded`].
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`] — process-local map, optional byte ceiling. Used in
//!   tests and when no persistence is wanted.
//! - [`FileStore`] — one JSON file per key in a directory, written
//!   atomically (temp file + rename).

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a [`DurableStore`].
///
/// The cache and quota layers never propagate these; they log and degrade.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store capacity exceeded: need {needed} bytes, {available} available")]
    CapacityExceeded { needed: usize, available: usize },

    #[error("invalid store key: {0}")]
    InvalidKey(String),
}

/// Synchronous string-keyed durable storage.
pub trait DurableStore: Send + Sync {
    /// Read the value stored under `key`, `Ok(None)` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// List every key currently stored.
    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// List the keys that start with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

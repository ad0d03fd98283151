//! Caching subsystem.
//!
//! Three layers, leaves first:
//!
//! - [`TtlCache`] — bounded in-memory key/value cache with per-entry TTL,
//!   insertion-order eviction and hit/miss statistics. Generic over the
//!   cached value.
//!
//! - [`PersistedCache`] — a [`TtlCache`] mirrored into a
//!   [`DurableStore`](crate::store::DurableStore) with absolute expiry
//!   timestamps, so entries survive process restarts.
//!
//! - [`derive_key`] / [`derive_scoped_key`] — deterministic keys from an
//!   operation name and a parameter bag.
//!
//! [`RecipeGateway`](crate::RecipeGateway) uses all three; nothing here
//! knows about recipes.

pub mod key;
pub mod memory;
pub mod persisted;

pub use key::{ParamValue, derive_key, derive_scoped_key};
pub use memory::{CacheConfig, CacheStats, Expiry, TtlCache};
pub use persisted::{DEFAULT_NAMESPACE, PersistedCache, PersistedRecord};

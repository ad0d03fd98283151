//! API-key quota tracking and rotation.
//!
//! [`QuotaTracker`] counts requests per credential per local day and
//! persists the table; [`KeyRotator`] picks the next credential with quota
//! left.

pub mod rotation;
pub mod tracker;

pub use rotation::{KeyRotator, SelectedCredential};
pub use tracker::{
    ApiCredential, DEFAULT_DAILY_LIMIT, QUOTA_STORAGE_KEY, QuotaRecord, QuotaTracker,
    next_local_midnight,
};

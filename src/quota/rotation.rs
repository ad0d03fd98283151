//! Round-robin credential selection.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::tracker::{ApiCredential, QuotaTracker};

/// A credential chosen for one outbound request.
#[derive(Debug, Clone)]
pub struct SelectedCredential {
    pub credential: ApiCredential,
    /// Position in the configured credential list.
    pub index: usize,
    /// Quota left before this request is counted.
    pub remaining: u32,
}

/// Picks the next credential with quota left.
///
/// Selection starts just after the previously chosen index and wraps around
/// the list once, so load spreads across credentials. The last index lives
/// in memory only: after a restart the first pick starts from index 0.
pub struct KeyRotator {
    credentials: Vec<ApiCredential>,
    tracker: Arc<QuotaTracker>,
    last_index: Mutex<Option<usize>>,
}

impl KeyRotator {
    pub fn new(credentials: Vec<ApiCredential>, tracker: Arc<QuotaTracker>) -> Self {
        for credential in &credentials {
            if tracker.record(&credential.id).is_none() {
                warn!(credential = %credential.id, "credential has no quota record and will never be selected");
            }
        }
        Self {
            credentials,
            tracker,
            last_index: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &[ApiCredential] {
        &self.credentials
    }

    pub fn tracker(&self) -> &Arc<QuotaTracker> {
        &self.tracker
    }

    /// Index of the most recently selected credential.
    pub fn last_index(&self) -> Option<usize> {
        *self.last_index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Select the next available credential, or `None` when all are
    /// exhausted. Rolls quota windows over first.
    pub fn select_credential(&self) -> Option<SelectedCredential> {
        self.tracker.rollover_if_needed();

        let len = self.credentials.len();
        if len == 0 {
            return None;
        }

        let mut last = self.last_index.lock().unwrap_or_else(PoisonError::into_inner);
        let start = last.map_or(0, |i| (i + 1) % len);

        for offset in 0..len {
            let index = (start + offset) % len;
            let credential = &self.credentials[index];
            let Some(record) = self.tracker.record(&credential.id) else {
                continue;
            };
            if record.is_exhausted() {
                continue;
            }
            *last = Some(index);
            debug!(
                credential = %credential.id,
                index,
                remaining = record.remaining(),
                "selected credential"
            );
            return Some(SelectedCredential {
                credential: credential.clone(),
                index,
                remaining: record.remaining(),
            });
        }

        debug!(credentials = len, "all credentials exhausted");
        None
    }
}

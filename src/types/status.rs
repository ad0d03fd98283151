//! Quota status reporting

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;

/// Quota state of one credential. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub id: String,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub exhausted: bool,
    pub reset_at: DateTime<Utc>,
}

/// Snapshot returned by `RecipeGateway::get_quota_status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaStatus {
    pub credentials: Vec<CredentialStatus>,
    /// Sum of remaining quota across credentials.
    pub total_remaining: u32,
    pub cache: CacheStats,
}

impl QuotaStatus {
    pub fn all_exhausted(&self) -> bool {
        self.credentials.iter().all(|c| c.exhausted)
    }
}

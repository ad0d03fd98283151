//! Larder error types

use crate::store::StoreError;

/// Larder error types
#[derive(Debug, thiserror::Error)]
pub enum LarderError {
    // Quota errors
    /// Every configured credential has used up its daily quota.
    #[error("no API credential has remaining quota")]
    QuotaExhausted,

    /// The provider itself refused the request for quota reasons.
    ///
    /// `credential` is the id of the credential that was rejected, filled in
    /// by the gateway (providers don't know credential ids).
    #[error("provider rejected credential {credential:?} for quota: {message}")]
    ProviderQuotaRejected {
        credential: Option<String>,
        message: String,
    },

    #[error("unknown API credential: {0}")]
    UnknownCredential(String),

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("recipe not found: {0}")]
    NotFound(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LarderError {
    /// Whether re-issuing the same request may succeed.
    ///
    /// A provider quota rejection is retryable because the next attempt
    /// selects a different credential.
    pub fn is_retryable(&self) -> bool {
        match self {
            LarderError::ProviderQuotaRejected { .. } | LarderError::Http(_) => true,
            LarderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether a caller should try an alternate data source after this error.
    ///
    /// Quota problems and transport failures fall back; caller mistakes
    /// (`InvalidInput`, `NotFound`) do not.
    pub fn should_fall_back(&self) -> bool {
        matches!(
            self,
            LarderError::QuotaExhausted
                | LarderError::ProviderQuotaRejected { .. }
                | LarderError::Http(_)
                | LarderError::Api { .. }
                | LarderError::AuthenticationFailed
                | LarderError::MalformedResponse(_)
                | LarderError::Json(_)
                | LarderError::NoProvider
        )
    }

    /// Whether this error is a quota condition (local or provider-reported).
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            LarderError::QuotaExhausted | LarderError::ProviderQuotaRejected { .. }
        )
    }
}

impl From<reqwest::Error> for LarderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LarderError::MalformedResponse(err.to_string())
        } else {
            LarderError::Http(err.to_string())
        }
    }
}

/// Result type alias for Larder operations
pub type Result<T> = std::result::Result<T, LarderError>;

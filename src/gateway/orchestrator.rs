//! Cache-aside request orchestration.
//!
//! Every operation follows the same path:
//!
//! 1. derive a cache key from the operation, its parameters and (for
//!    personalised calls) the user id;
//! 2. return a cache hit without touching quota;
//! 3. otherwise select a credential, failing with `QuotaExhausted` when none
//!    has quota left;
//! 4. call the provider;
//! 5. on success count the request, normalise the response and cache it
//!    with the operation's TTL;
//! 6. on a provider quota rejection force-exhaust the credential and return
//!    `ProviderQuotaRejected` (callers may retry; the next attempt uses
//!    another credential);
//! 7. on any other failure return the error and change nothing.
//!
//! There is no single-flight: concurrent misses for one key each call the
//! provider and each populate the cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use crate::cache::{PersistedCache, derive_scoped_key};
use crate::convert;
use crate::providers::RecipeProvider;
use crate::quota::{KeyRotator, QuotaTracker};
use crate::telemetry;
use crate::types::{
    CachedPayload, CredentialStatus, ProviderRequest, QuotaStatus, Recipe, RecipeOperation,
    RecipeSummary, UserProfile,
};
use crate::{LarderError, Result};

/// Number of results requested from search-style endpoints.
pub const DEFAULT_RESULT_COUNT: u32 = 10;

/// Upper bound on `get_random` counts (provider maximum).
pub const MAX_RANDOM_COUNT: usize = 100;

/// Cache lifetimes per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub personalized: Duration,
    pub search: Duration,
    pub random: Duration,
    pub details: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            personalized: Duration::from_secs(6 * 60 * 60),
            search: Duration::from_secs(60 * 60),
            random: Duration::from_secs(15 * 60),
            details: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CacheTtls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn personalized(mut self, ttl: Duration) -> Self {
        self.personalized = ttl;
        self
    }

    pub fn search(mut self, ttl: Duration) -> Self {
        self.search = ttl;
        self
    }

    pub fn random(mut self, ttl: Duration) -> Self {
        self.random = ttl;
        self
    }

    pub fn details(mut self, ttl: Duration) -> Self {
        self.details = ttl;
        self
    }

    pub fn for_operation(&self, operation: RecipeOperation) -> Duration {
        match operation {
            RecipeOperation::Personalized => self.personalized,
            RecipeOperation::Search => self.search,
            RecipeOperation::Random => self.random,
            RecipeOperation::Details => self.details,
        }
    }
}

/// Recipe API gateway with caching and credential rotation.
///
/// Construct with [`Larder::builder()`](crate::Larder::builder) or
/// [`RecipeGateway::new`].
pub struct RecipeGateway {
    provider: Arc<dyn RecipeProvider>,
    rotator: KeyRotator,
    cache: PersistedCache<CachedPayload>,
    ttls: CacheTtls,
}

impl RecipeGateway {
    pub fn new(
        provider: Arc<dyn RecipeProvider>,
        rotator: KeyRotator,
        cache: PersistedCache<CachedPayload>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            provider,
            rotator,
            cache,
            ttls,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn cache(&self) -> &PersistedCache<CachedPayload> {
        &self.cache
    }

    pub fn rotator(&self) -> &KeyRotator {
        &self.rotator
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        self.rotator.tracker()
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    /// Recipes matching the profile's diet, intolerances and cuisines.
    ///
    /// Results are cached per user.
    #[instrument(skip(self, profile), fields(user = profile.user_id.as_deref().unwrap_or("-")))]
    pub async fn get_personalized_results(
        &self,
        profile: &UserProfile,
    ) -> Result<Vec<RecipeSummary>> {
        let request = ProviderRequest::new(RecipeOperation::Personalized)
            .params(profile.query_params())
            .param("number", DEFAULT_RESULT_COUNT)
            .param("addRecipeInformation", true);
        let payload = self.resolve(profile.scope(), request).await?;
        into_summaries(payload)
    }

    /// Free-text search, optionally narrowed by a profile.
    #[instrument(skip(self, profile))]
    pub async fn search(
        &self,
        query: &str,
        profile: Option<&UserProfile>,
    ) -> Result<Vec<RecipeSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LarderError::InvalidInput("search query is empty".to_string()));
        }
        let mut request = ProviderRequest::new(RecipeOperation::Search)
            .param("query", query)
            .param("number", DEFAULT_RESULT_COUNT);
        if let Some(profile) = profile {
            request = request.params(profile.query_params());
        }
        let payload = self
            .resolve(profile.and_then(UserProfile::scope), request)
            .await?;
        into_summaries(payload)
    }

    /// Up to `count` random recipes.
    ///
    /// Cached briefly, so repeated calls within the TTL return the same set.
    #[instrument(skip(self))]
    pub async fn get_random(&self, count: usize) -> Result<Vec<RecipeSummary>> {
        if count == 0 || count > MAX_RANDOM_COUNT {
            return Err(LarderError::InvalidInput(format!(
                "random count must be between 1 and {MAX_RANDOM_COUNT}, got {count}"
            )));
        }
        let request =
            ProviderRequest::new(RecipeOperation::Random).param("number", count as i64);
        let payload = self.resolve(None, request).await?;
        into_summaries(payload)
    }

    /// Full details for one recipe.
    #[instrument(skip(self))]
    pub async fn get_details(&self, id: &str) -> Result<Recipe> {
        let id = id.trim();
        if id.is_empty() {
            return Err(LarderError::InvalidInput("recipe id is empty".to_string()));
        }
        let request = ProviderRequest::new(RecipeOperation::Details)
            .param("id", id)
            .param("includeNutrition", false);
        match self.resolve(None, request).await? {
            CachedPayload::Recipe(recipe) => Ok(*recipe),
            CachedPayload::Summaries(_) => Err(LarderError::MalformedResponse(
                "expected recipe details, found a result list".to_string(),
            )),
        }
    }

    /// Per-credential quota and cache counters.
    pub fn get_quota_status(&self) -> QuotaStatus {
        self.quota().rollover_if_needed();
        let credentials: Vec<CredentialStatus> = self
            .quota()
            .snapshot()
            .into_iter()
            .map(|(id, record)| CredentialStatus {
                id,
                used: record.used,
                limit: record.limit,
                remaining: record.remaining(),
                exhausted: record.is_exhausted(),
                reset_at: record.reset_at,
            })
            .collect();
        let total_remaining = credentials.iter().map(|c| c.remaining).sum();
        QuotaStatus {
            credentials,
            total_remaining,
            cache: self.cache.stats(),
        }
    }

    /// Stop background cache maintenance. Durable records are kept.
    pub fn close(&self) {
        self.cache.close();
    }

    async fn resolve(
        &self,
        scope: Option<&str>,
        request: ProviderRequest,
    ) -> Result<CachedPayload> {
        let operation = request.operation;
        let key = derive_scoped_key(scope, operation.as_str(), &request.params);

        if let Some(payload) = self.cache.get_from_cache(&key) {
            debug!(operation = %operation, "served from cache");
            return Ok(payload);
        }

        let Some(selected) = self.rotator.select_credential() else {
            warn!(operation = %operation, "all credentials exhausted");
            return Err(LarderError::QuotaExhausted);
        };
        let credential_id = selected.credential.id.as_str();

        let start = Instant::now();
        let outcome = self
            .provider
            .fetch(&request, selected.credential.secret())
            .await;
        self.record_request(operation, start, outcome.is_ok());

        match outcome {
            Ok(raw) => {
                self.quota().record_usage(credential_id)?;
                let payload = convert::to_payload(operation, raw)?;
                self.cache
                    .set_cache(&key, payload.clone(), self.ttls.for_operation(operation));
                debug!(operation = %operation, credential = credential_id, "fetched and cached");
                Ok(payload)
            }
            Err(LarderError::ProviderQuotaRejected { message, .. }) => {
                metrics::counter!(telemetry::QUOTA_REJECTIONS_TOTAL,
                    "provider" => self.provider.name().to_owned(),
                )
                .increment(1);
                warn!(
                    operation = %operation,
                    credential = credential_id,
                    message = %message,
                    "provider rejected credential for quota"
                );
                self.quota().force_exhaust(credential_id)?;
                Err(LarderError::ProviderQuotaRejected {
                    credential: Some(credential_id.to_string()),
                    message,
                })
            }
            Err(e) => {
                debug!(operation = %operation, error = %e, "provider request failed");
                Err(e)
            }
        }
    }

    fn record_request(&self, operation: RecipeOperation, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        let elapsed = start.elapsed().as_secs_f64();
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => self.provider.name().to_owned(),
            "operation" => operation.as_str(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => self.provider.name().to_owned(),
            "operation" => operation.as_str(),
        )
        .record(elapsed);
    }
}

fn into_summaries(payload: CachedPayload) -> Result<Vec<RecipeSummary>> {
    match payload {
        CachedPayload::Summaries(summaries) => Ok(summaries),
        CachedPayload::Recipe(_) => Err(LarderError::MalformedResponse(
            "expected a result list, found recipe details".to_string(),
        )),
    }
}

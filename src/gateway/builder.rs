//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::RecipeGateway;
use super::orchestrator::CacheTtls;
use crate::cache::{CacheConfig, DEFAULT_NAMESPACE, PersistedCache};
use crate::providers::{RecipeProvider, SpoonacularClient};
use crate::quota::{ApiCredential, DEFAULT_DAILY_LIMIT, KeyRotator, QuotaTracker};
use crate::store::{DurableStore, MemoryStore};
use crate::{LarderError, Result};

/// Main entry point for creating gateway instances.
pub struct Larder;

impl Larder {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> LarderBuilder {
        LarderBuilder::new()
    }
}

/// Builder for configuring gateway instances.
pub struct LarderBuilder {
    credentials: Vec<ApiCredential>,
    daily_limit: u32,
    store: Option<Arc<dyn DurableStore>>,
    cache_config: CacheConfig,
    cache_ttls: CacheTtls,
    namespace: String,
    hydrate: bool,
    provider: Option<Arc<dyn RecipeProvider>>,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl Default for LarderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LarderBuilder {
    pub fn new() -> Self {
        Self {
            credentials: Vec::new(),
            daily_limit: DEFAULT_DAILY_LIMIT,
            store: None,
            cache_config: CacheConfig::default(),
            cache_ttls: CacheTtls::default(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            hydrate: true,
            provider: None,
            base_url: None,
            timeout: None,
        }
    }

    /// Add a credential with an explicit id.
    pub fn api_key(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials.push(ApiCredential::new(id, secret));
        self
    }

    pub fn credential(mut self, credential: ApiCredential) -> Self {
        self.credentials.push(credential);
        self
    }

    /// Add several secrets with generated ids (`key-1`, `key-2`, ...).
    ///
    /// Ids are positional, so keep the order stable across restarts or the
    /// persisted quota table will be attributed to the wrong keys.
    pub fn spoonacular_keys<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for secret in secrets {
            let id = format!("key-{}", self.credentials.len() + 1);
            self.credentials.push(ApiCredential::new(id, secret));
        }
        self
    }

    /// Requests per credential per local day (default 150).
    pub fn daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = limit;
        self
    }

    /// Durable store for the cache tier and quota table.
    ///
    /// Without one, everything lives in memory and is lost on exit.
    pub fn store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn cache_ttls(mut self, ttls: CacheTtls) -> Self {
        self.cache_ttls = ttls;
        self
    }

    /// Durable key prefix for cache records.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Load surviving cache records into memory at build time (default on).
    pub fn hydrate(mut self, enabled: bool) -> Self {
        self.hydrate = enabled;
        self
    }

    /// Use a custom keyed provider instead of Spoonacular.
    pub fn provider(mut self, provider: Arc<dyn RecipeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Spoonacular base URL (for testing with wiremock).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Provider request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<RecipeGateway> {
        if self.credentials.is_empty() {
            return Err(LarderError::NoProvider);
        }
        if self.daily_limit == 0 {
            return Err(LarderError::Configuration(
                "daily limit must be at least 1".to_string(),
            ));
        }

        let provider: Arc<dyn RecipeProvider> = match self.provider {
            Some(provider) => provider,
            None => {
                let base_url = self
                    .base_url
                    .unwrap_or_else(|| crate::providers::spoonacular::DEFAULT_BASE_URL.to_string());
                let timeout = self
                    .timeout
                    .unwrap_or(crate::providers::spoonacular::DEFAULT_TIMEOUT);
                Arc::new(SpoonacularClient::with_options(base_url, timeout)?)
            }
        };

        let store: Arc<dyn DurableStore> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let tracker = Arc::new(QuotaTracker::for_credentials(
            &self.credentials,
            self.daily_limit,
            Some(store.clone()),
        ));
        let credential_count = self.credentials.len();
        let rotator = KeyRotator::new(self.credentials, tracker);

        let cache = PersistedCache::with_namespace(self.cache_config, store, self.namespace);
        let hydrated = if self.hydrate { cache.hydrate() } else { 0 };

        info!(
            provider = provider.name(),
            credentials = credential_count,
            daily_limit = self.daily_limit,
            hydrated,
            "recipe gateway ready"
        );

        Ok(RecipeGateway::new(provider, rotator, cache, self.cache_ttls))
    }
}

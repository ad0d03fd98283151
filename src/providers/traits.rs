//! Provider traits.
//!
//! Two kinds of recipe source sit behind larder:
//!
//! - [`RecipeProvider`]: the keyed, quota-metered provider. It returns raw
//!   JSON; the gateway owns caching, credential selection and normalisation,
//!   so the provider only has to know how to talk HTTP.
//! - [`OpenRecipeSource`]: an unmetered source used as a fallback. It
//!   returns larder types directly and is never cached or quota-tracked.
//!
//! # Quota rejections
//!
//! A keyed provider that is refused for quota reasons must return
//! `LarderError::ProviderQuotaRejected`. The gateway fills in the credential
//! id and force-exhausts that credential. Every other error is passed to the
//! caller without touching quota or cache state.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::types::{ProviderRequest, Recipe, RecipeSummary};

/// A quota-metered recipe API authenticated with one credential per call.
#[async_trait]
pub trait RecipeProvider: Send + Sync {
    /// Provider name for logging and metrics.
    fn name(&self) -> &str;

    /// Execute `request` using `api_key` and return the decoded body.
    async fn fetch(&self, request: &ProviderRequest, api_key: &str) -> Result<Value>;
}

/// An unmetered recipe source.
#[async_trait]
pub trait OpenRecipeSource: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<RecipeSummary>>;

    /// Up to `count` random recipes.
    ///
    /// Default implementation calls [`random_one`](Self::random_one) `count`
    /// times.
    async fn random(&self, count: usize) -> Result<Vec<RecipeSummary>> {
        let mut results = Vec::with_capacity(count);
        for _ in 0..count {
            results.push(self.random_one().await?.to_summary());
        }
        Ok(results)
    }

    async fn random_one(&self) -> Result<Recipe>;

    async fn details(&self, id: &str) -> Result<Recipe>;
}

//! Caller-side fallback chain.
//!
//! [`RecipeService`] wraps a [`RecipeGateway`] and decides what to do when
//! it fails:
//!
//! - a provider quota rejection is retried once (the retry selects another
//!   credential);
//! - errors classified by [`LarderError::should_fall_back`] go to the open
//!   source, if configured;
//! - if that fails too, the built-in samples answer, if enabled.
//!
//! Caller mistakes such as an empty query or an unknown recipe id are
//! returned unchanged. Fallback results are never cached.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::RecipeGateway;
use crate::providers::OpenRecipeSource;
use crate::samples;
use crate::telemetry;
use crate::types::{QuotaStatus, Recipe, RecipeSummary, UserProfile};
use crate::{LarderError, Result};

/// Where a result came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum RecipeSource {
    /// The keyed provider, possibly via cache.
    Primary,
    /// An open source, by name.
    Fallback(String),
    /// Built-in sample data.
    Samples,
}

/// A result tagged with its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: RecipeSource,
}

impl<T> Sourced<T> {
    fn new(value: T, source: RecipeSource) -> Self {
        Self { value, source }
    }
}

/// Gateway plus fallback sources.
pub struct RecipeService {
    gateway: Arc<RecipeGateway>,
    fallback: Option<Arc<dyn OpenRecipeSource>>,
    samples: bool,
}

impl RecipeService {
    /// Wrap `gateway` with samples enabled and no open source.
    pub fn new(gateway: Arc<RecipeGateway>) -> Self {
        Self {
            gateway,
            fallback: None,
            samples: true,
        }
    }

    pub fn with_fallback(mut self, source: Arc<dyn OpenRecipeSource>) -> Self {
        self.fallback = Some(source);
        self
    }

    pub fn with_samples(mut self, enabled: bool) -> Self {
        self.samples = enabled;
        self
    }

    pub fn gateway(&self) -> &Arc<RecipeGateway> {
        &self.gateway
    }

    pub fn quota_status(&self) -> QuotaStatus {
        self.gateway.get_quota_status()
    }

    pub async fn get_personalized_results(
        &self,
        profile: &UserProfile,
    ) -> Result<Sourced<Vec<RecipeSummary>>> {
        let primary = self
            .primary(|| self.gateway.get_personalized_results(profile))
            .await;
        let hint = profile
            .cuisines
            .first()
            .or(profile.diet.as_ref())
            .map(String::as_str)
            .unwrap_or_default();
        self.fall_back_list(primary, "personalized", hint).await
    }

    pub async fn search(
        &self,
        query: &str,
        profile: Option<&UserProfile>,
    ) -> Result<Sourced<Vec<RecipeSummary>>> {
        let primary = self.primary(|| self.gateway.search(query, profile)).await;
        self.fall_back_list(primary, "search", query).await
    }

    pub async fn get_random(&self, count: usize) -> Result<Sourced<Vec<RecipeSummary>>> {
        let primary = self.primary(|| self.gateway.get_random(count)).await;
        let err = match primary {
            Ok(value) => return Ok(Sourced::new(value, RecipeSource::Primary)),
            Err(e) if !e.should_fall_back() => return Err(e),
            Err(e) => e,
        };

        if let Some(source) = &self.fallback {
            match source.random(count).await {
                Ok(value) => return Ok(self.fallback_hit(value, source.name())),
                Err(e) => warn!(source = source.name(), error = %e, "fallback random failed"),
            }
        }
        if self.samples {
            return Ok(self.samples_hit(samples::sample_summaries(count)));
        }
        Err(err)
    }

    pub async fn get_details(&self, id: &str) -> Result<Sourced<Recipe>> {
        if let Some(recipe) = samples::find_sample(id) {
            return Ok(Sourced::new(recipe, RecipeSource::Samples));
        }

        let primary = self.primary(|| self.gateway.get_details(id)).await;
        let err = match primary {
            Ok(value) => return Ok(Sourced::new(value, RecipeSource::Primary)),
            Err(e) if !e.should_fall_back() => return Err(e),
            Err(e) => e,
        };

        if let Some(source) = &self.fallback {
            match source.details(id).await {
                Ok(value) => return Ok(self.fallback_hit(value, source.name())),
                Err(e) => warn!(source = source.name(), id, error = %e, "fallback details failed"),
            }
        }
        Err(err)
    }

    /// Run a gateway call, retrying once on a provider quota rejection.
    async fn primary<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match call().await {
            Err(LarderError::ProviderQuotaRejected { credential, .. }) => {
                info!(credential = ?credential, "retrying with next credential");
                call().await
            }
            other => other,
        }
    }

    async fn fall_back_list(
        &self,
        primary: Result<Vec<RecipeSummary>>,
        operation: &str,
        query: &str,
    ) -> Result<Sourced<Vec<RecipeSummary>>> {
        let err = match primary {
            Ok(value) => return Ok(Sourced::new(value, RecipeSource::Primary)),
            Err(e) if !e.should_fall_back() => return Err(e),
            Err(e) => e,
        };
        warn!(operation, error = %err, "primary source failed, falling back");

        if let Some(source) = &self.fallback {
            match source.search(query).await {
                Ok(value) => return Ok(self.fallback_hit(value, source.name())),
                Err(e) => warn!(source = source.name(), operation, error = %e, "fallback failed"),
            }
        }
        if self.samples {
            return Ok(self.samples_hit(samples::search_samples(query)));
        }
        Err(err)
    }

    fn fallback_hit<T>(&self, value: T, name: &str) -> Sourced<T> {
        metrics::counter!(telemetry::FALLBACKS_TOTAL, "source" => "fallback").increment(1);
        info!(source = name, "served from fallback source");
        Sourced::new(value, RecipeSource::Fallback(name.to_string()))
    }

    fn samples_hit<T>(&self, value: T) -> Sourced<T> {
        metrics::counter!(telemetry::FALLBACKS_TOTAL, "source" => "samples").increment(1);
        info!("served from built-in samples");
        Sourced::new(value, RecipeSource::Samples)
    }
}

//! Tests for the fallback chain in RecipeService.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use larder::cache::CacheConfig;
use larder::providers::{OpenRecipeSource, RecipeProvider};
use larder::{
    Larder, LarderError, ProviderRequest, Recipe, RecipeService, RecipeSource, RecipeSummary,
    Result, UserProfile,
};

// ============================================================================
// Mocks
// ============================================================================

/// Keyed provider that fails the first `failures` calls with `error`.
struct FlakyProvider {
    calls: AtomicUsize,
    failures: usize,
    error: fn() -> LarderError,
}

impl FlakyProvider {
    fn new(failures: usize, error: fn() -> LarderError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures,
            error,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecipeProvider for FlakyProvider {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn fetch(&self, _request: &ProviderRequest, _api_key: &str) -> Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err((self.error)());
        }
        Ok(json!({ "results": [{ "id": 7, "title": "Primary Pasta" }] }))
    }
}

struct StaticSource {
    fail: bool,
}

#[async_trait]
impl OpenRecipeSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str) -> Result<Vec<RecipeSummary>> {
        if self.fail {
            return Err(LarderError::Http("offline".to_string()));
        }
        Ok(vec![RecipeSummary {
            id: "s-1".to_string(),
            title: format!("Open {query}"),
            ..Default::default()
        }])
    }

    async fn random_one(&self) -> Result<Recipe> {
        if self.fail {
            return Err(LarderError::Http("offline".to_string()));
        }
        Ok(Recipe {
            id: "s-2".to_string(),
            title: "Open Random".to_string(),
            ..Default::default()
        })
    }

    async fn details(&self, id: &str) -> Result<Recipe> {
        if self.fail {
            return Err(LarderError::Http("offline".to_string()));
        }
        Ok(Recipe {
            id: id.to_string(),
            title: "Open Details".to_string(),
            ..Default::default()
        })
    }
}

fn quota_rejected() -> LarderError {
    LarderError::ProviderQuotaRejected {
        credential: None,
        message: "daily points limit reached".to_string(),
    }
}

fn transport_error() -> LarderError {
    LarderError::Http("connection refused".to_string())
}

fn not_found() -> LarderError {
    LarderError::NotFound("42".to_string())
}

fn service(provider: Arc<FlakyProvider>, keys: &[&str], limit: u32) -> RecipeService {
    let mut builder = Larder::builder()
        .provider(provider)
        .daily_limit(limit)
        .cache_config(CacheConfig::new().no_check_period());
    for id in keys {
        builder = builder.api_key(*id, format!("secret-{id}"));
    }
    RecipeService::new(Arc::new(builder.build().unwrap()))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn primary_result_is_tagged_primary() {
    let service = service(FlakyProvider::new(0, transport_error), &["a"], 10);
    let result = service.search("pasta", None).await.unwrap();
    assert_eq!(result.source, RecipeSource::Primary);
    assert_eq!(result.value[0].title, "Primary Pasta");
}

#[tokio::test]
async fn quota_rejection_is_retried_once_with_the_next_credential() {
    let provider = FlakyProvider::new(1, quota_rejected);
    let service = service(provider.clone(), &["a", "b"], 10);

    let result = service.search("pasta", None).await.unwrap();
    assert_eq!(result.source, RecipeSource::Primary);
    assert_eq!(provider.calls(), 2);

    let status = service.quota_status();
    assert!(status.credentials[0].exhausted);
    assert_eq!(status.credentials[1].used, 1);
}

#[tokio::test]
async fn exhausted_primary_falls_back_to_open_source() {
    let provider = FlakyProvider::new(usize::MAX, quota_rejected);
    let service = service(provider.clone(), &["a"], 10)
        .with_fallback(Arc::new(StaticSource { fail: false }));

    let result = service.search("curry", None).await.unwrap();
    assert_eq!(result.source, RecipeSource::Fallback("static".to_string()));
    assert_eq!(result.value[0].title, "Open curry");
    // one rejection, then the retry found no credential left
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn samples_answer_when_everything_else_fails() {
    let service = service(FlakyProvider::new(usize::MAX, transport_error), &["a"], 10)
        .with_fallback(Arc::new(StaticSource { fail: true }));

    let result = service.search("curry", None).await.unwrap();
    assert_eq!(result.source, RecipeSource::Samples);
    assert!(result.value.iter().any(|r| r.title.contains("Curry")));
}

#[tokio::test]
async fn error_is_returned_when_samples_are_disabled() {
    let service =
        service(FlakyProvider::new(usize::MAX, transport_error), &["a"], 10).with_samples(false);

    let err = service.search("curry", None).await.unwrap_err();
    assert!(matches!(err, LarderError::Http(_)));
}

#[tokio::test]
async fn caller_mistakes_never_fall_back() {
    let service = service(FlakyProvider::new(usize::MAX, not_found), &["a"], 10)
        .with_fallback(Arc::new(StaticSource { fail: false }));

    assert!(matches!(
        service.search("  ", None).await,
        Err(LarderError::InvalidInput(_))
    ));
    assert!(matches!(
        service.get_details("42").await,
        Err(LarderError::NotFound(_))
    ));
}

#[tokio::test]
async fn random_falls_back_to_samples() {
    let service = service(FlakyProvider::new(usize::MAX, transport_error), &["a"], 10);
    let result = service.get_random(3).await.unwrap();
    assert_eq!(result.source, RecipeSource::Samples);
    assert_eq!(result.value.len(), 3);
}

#[tokio::test]
async fn details_fall_back_to_open_source() {
    let service = service(FlakyProvider::new(usize::MAX, transport_error), &["a"], 10)
        .with_fallback(Arc::new(StaticSource { fail: false }));

    let result = service.get_details("99").await.unwrap();
    assert_eq!(result.source, RecipeSource::Fallback("static".to_string()));
    assert_eq!(result.value.id, "99");
}

#[tokio::test]
async fn sample_ids_are_served_without_the_provider() {
    let provider = FlakyProvider::new(0, transport_error);
    let service = service(provider.clone(), &["a"], 10);

    let result = service.get_details("sample-2").await.unwrap();
    assert_eq!(result.source, RecipeSource::Samples);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn personalized_fallback_uses_profile_hints() {
    let service = service(FlakyProvider::new(usize::MAX, transport_error), &["a"], 10);
    let profile = UserProfile::new().user("u1").cuisine("Mexican");

    let result = service.get_personalized_results(&profile).await.unwrap();
    assert_eq!(result.source, RecipeSource::Samples);
    assert!(result.value.iter().any(|r| r.title == "Black Bean Tacos"));
}

//! Tests for the cache-aside gateway using a scripted provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use larder::cache::CacheConfig;
use larder::providers::RecipeProvider;
use larder::store::{DurableStore, MemoryStore};
use larder::{Larder, LarderError, ProviderRequest, RecipeGateway, RecipeOperation, Result, UserProfile};

// ============================================================================
// Mock provider
// ============================================================================

type Script = Box<dyn Fn(&ProviderRequest) -> Result<Value> + Send + Sync>;

struct MockProvider {
    calls: AtomicUsize,
    keys: Mutex<Vec<String>>,
    script: Script,
}

impl MockProvider {
    fn ok() -> Arc<Self> {
        Self::scripted(|request| Ok(canned(request)))
    }

    fn scripted(script: impl Fn(&ProviderRequest) -> Result<Value> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecipeProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, request: &ProviderRequest, api_key: &str) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(api_key.to_string());
        (self.script)(request)
    }
}

fn canned(request: &ProviderRequest) -> Value {
    match request.operation {
        RecipeOperation::Personalized | RecipeOperation::Search => json!({
            "results": [
                { "id": 101, "title": "Pasta Primavera", "readyInMinutes": 25 },
                { "id": 102, "title": "Pesto Gnocchi" }
            ]
        }),
        RecipeOperation::Random => json!({
            "recipes": [{ "id": 201, "title": "Miso Soup" }]
        }),
        RecipeOperation::Details => json!({
            "id": 301,
            "title": "Beef Stew",
            "servings": 4,
            "extendedIngredients": [
                { "name": "beef", "amount": 500.0, "unit": "g", "original": "500 g beef" }
            ],
            "instructions": "Brown the beef.\nSimmer for two hours."
        }),
    }
}

fn gateway(provider: Arc<MockProvider>, keys: &[&str], limit: u32) -> RecipeGateway {
    gateway_with_store(provider, keys, limit, Arc::new(MemoryStore::new()))
}

fn gateway_with_store(
    provider: Arc<MockProvider>,
    keys: &[&str],
    limit: u32,
    store: Arc<dyn DurableStore>,
) -> RecipeGateway {
    let mut builder = Larder::builder()
        .provider(provider)
        .daily_limit(limit)
        .store(store)
        .cache_config(CacheConfig::new().no_check_period());
    for id in keys {
        builder = builder.api_key(*id, format!("secret-{id}"));
    }
    builder.build().unwrap()
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn builder_without_credentials_is_an_error() {
    let result = Larder::builder().build();
    assert!(matches!(result, Err(LarderError::NoProvider)));
}

#[test]
fn builder_rejects_zero_daily_limit() {
    let result = Larder::builder().api_key("a", "secret").daily_limit(0).build();
    assert!(matches!(result, Err(LarderError::Configuration(_))));
}

#[tokio::test]
async fn builder_with_spoonacular_keys_builds_without_network() {
    let gateway = Larder::builder()
        .spoonacular_keys(["first-secret", "second-secret"])
        .build()
        .unwrap();
    assert_eq!(gateway.provider_name(), "spoonacular");
    let ids: Vec<String> = gateway
        .get_quota_status()
        .credentials
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec!["key-1", "key-2"]);
}

// ============================================================================
// Cache-aside flow
// ============================================================================

#[tokio::test]
async fn quota_is_spent_only_on_misses() {
    let provider = MockProvider::ok();
    let gateway = gateway(provider.clone(), &["only"], 2);

    let first = gateway.search("pasta", None).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].id, "101");
    gateway.get_random(1).await.unwrap();
    assert_eq!(provider.calls(), 2);

    let third = gateway.search("soup", None).await;
    assert!(matches!(third, Err(LarderError::QuotaExhausted)));
    assert_eq!(provider.calls(), 2, "exhausted gateway must not call the provider");

    let cached = gateway.search("pasta", None).await.unwrap();
    assert_eq!(cached, first);
    assert_eq!(provider.calls(), 2);

    let status = gateway.get_quota_status();
    assert_eq!(status.credentials[0].used, 2);
    assert!(status.all_exhausted());
    assert_eq!(status.total_remaining, 0);
}

#[tokio::test]
async fn cache_hit_does_not_touch_quota() {
    let provider = MockProvider::ok();
    let gateway = gateway(provider.clone(), &["only"], 10);

    gateway.get_details("301").await.unwrap();
    gateway.get_details("301").await.unwrap();
    gateway.get_details(" 301 ").await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(gateway.quota().record("only").unwrap().used, 1);
    let status = gateway.get_quota_status();
    assert_eq!(status.cache.hits, 2);
}

#[tokio::test]
async fn details_are_normalised() {
    let gateway = gateway(MockProvider::ok(), &["only"], 10);
    let recipe = gateway.get_details("301").await.unwrap();
    assert_eq!(recipe.title, "Beef Stew");
    assert_eq!(recipe.servings, Some(4));
    assert_eq!(recipe.ingredients.len(), 1);
    assert_eq!(recipe.ingredients[0].name, "beef");
    assert_eq!(recipe.instructions.len(), 2);
}

#[tokio::test]
async fn credentials_rotate_between_misses() {
    let provider = MockProvider::ok();
    let gateway = gateway(provider.clone(), &["a", "b"], 10);

    gateway.search("one", None).await.unwrap();
    gateway.search("two", None).await.unwrap();
    gateway.search("three", None).await.unwrap();

    assert_eq!(provider.keys(), vec!["secret-a", "secret-b", "secret-a"]);
}

#[tokio::test]
async fn results_survive_a_restart_through_the_store() {
    let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
    let provider = MockProvider::ok();
    {
        let gateway = gateway_with_store(provider.clone(), &["only"], 5, store.clone());
        gateway.search("pasta", None).await.unwrap();
        gateway.close();
    }

    let gateway = gateway_with_store(provider.clone(), &["only"], 5, store);
    gateway.search("pasta", None).await.unwrap();
    assert_eq!(provider.calls(), 1);
    // quota table was restored as well
    assert_eq!(gateway.quota().record("only").unwrap().used, 1);
}

// ============================================================================
// Personalisation
// ============================================================================

#[tokio::test]
async fn personalized_results_are_cached_per_user() {
    let provider = MockProvider::ok();
    let gateway = gateway(provider.clone(), &["only"], 10);

    let alice = UserProfile::new().user("alice").diet("vegan");
    let bob = UserProfile::new().user("bob").diet("vegan");

    gateway.get_personalized_results(&alice).await.unwrap();
    gateway.get_personalized_results(&alice).await.unwrap();
    assert_eq!(provider.calls(), 1);

    gateway.get_personalized_results(&bob).await.unwrap();
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn separator_characters_in_preferences_get_their_own_cache_entry() {
    let provider = MockProvider::ok();
    let gateway = gateway(provider.clone(), &["only"], 10);

    let plain = UserProfile::new().user("alice").cuisine("italian").diet("vegan");
    let crafted = UserProfile::new().user("alice").cuisine("italian&diet:vegan");

    gateway.get_personalized_results(&plain).await.unwrap();
    gateway.get_personalized_results(&crafted).await.unwrap();
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn profile_preferences_reach_the_provider() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = seen.clone();
    let provider = MockProvider::scripted(move |request| {
        captured.lock().unwrap().push(request.query_pairs());
        Ok(canned(request))
    });
    let gateway = gateway(provider, &["only"], 10);

    let profile = UserProfile::new()
        .diet("vegetarian")
        .intolerance("gluten")
        .intolerance("dairy")
        .max_ready_time(30);
    gateway.get_personalized_results(&profile).await.unwrap();

    let pairs = seen.lock().unwrap()[0].clone();
    assert!(pairs.contains(&("diet".to_string(), "vegetarian".to_string())));
    assert!(pairs.contains(&("maxReadyTime".to_string(), "30".to_string())));
    assert!(pairs.iter().any(|(k, v)| k == "intolerances" && v.contains("gluten")));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn provider_quota_rejection_exhausts_the_credential() {
    let provider = MockProvider::scripted(|request| {
        if request.get("query").is_some_and(|q| q.to_string().contains("blocked")) {
            Err(LarderError::ProviderQuotaRejected {
                credential: None,
                message: "daily points limit reached".to_string(),
            })
        } else {
            Ok(canned(request))
        }
    });
    let gateway = gateway(provider.clone(), &["a", "b"], 150);

    let err = gateway.search("blocked", None).await.unwrap_err();
    match err {
        LarderError::ProviderQuotaRejected { credential, .. } => {
            assert_eq!(credential.as_deref(), Some("a"));
        }
        other => panic!("expected a quota rejection, got {other:?}"),
    }

    let a = gateway.quota().record("a").unwrap();
    assert_eq!(a.used, 150);
    assert!(!gateway.quota().is_available("a"));

    // next request goes to the remaining credential
    gateway.search("fine", None).await.unwrap();
    assert_eq!(provider.keys().last().map(String::as_str), Some("secret-b"));
}

#[tokio::test]
async fn other_failures_change_nothing() {
    let provider = MockProvider::scripted(|_| Err(LarderError::Http("connection reset".to_string())));
    let gateway = gateway(provider.clone(), &["only"], 10);

    let err = gateway.search("pasta", None).await.unwrap_err();
    assert!(matches!(err, LarderError::Http(_)));
    assert_eq!(gateway.quota().record("only").unwrap().used, 0);
    assert!(gateway.cache().memory().is_empty());

    // not cached, so the next call reaches the provider again
    let _ = gateway.search("pasta", None).await;
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn not_found_is_passed_through() {
    let provider = MockProvider::scripted(|_| Err(LarderError::NotFound("999".to_string())));
    let gateway = gateway(provider, &["only"], 10);

    let err = gateway.get_details("999").await.unwrap_err();
    assert!(matches!(err, LarderError::NotFound(id) if id == "999"));
    assert_eq!(gateway.quota().record("only").unwrap().used, 0);
}

#[tokio::test]
async fn malformed_response_still_counts_usage() {
    let provider = MockProvider::scripted(|_| Ok(json!({ "results": "not a list" })));
    let gateway = gateway(provider, &["only"], 10);

    let err = gateway.search("pasta", None).await.unwrap_err();
    assert!(matches!(err, LarderError::MalformedResponse(_)));
    assert_eq!(gateway.quota().record("only").unwrap().used, 1);
    assert!(gateway.cache().memory().is_empty());
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_work() {
    let provider = MockProvider::ok();
    let gateway = gateway(provider.clone(), &["only"], 10);

    assert!(matches!(
        gateway.search("   ", None).await,
        Err(LarderError::InvalidInput(_))
    ));
    assert!(matches!(
        gateway.get_details("").await,
        Err(LarderError::InvalidInput(_))
    ));
    assert!(matches!(
        gateway.get_random(0).await,
        Err(LarderError::InvalidInput(_))
    ));
    assert!(matches!(
        gateway.get_random(101).await,
        Err(LarderError::InvalidInput(_))
    ));
    assert_eq!(provider.calls(), 0);
    assert_eq!(gateway.get_quota_status().cache.misses, 0);
}

//! Tests for the in-memory TTL cache.
//!
//! Timing tests run on a paused tokio clock and move it with
//! `tokio::time::advance`, so they are exact and instant.

use std::time::Duration;

use larder::cache::{CacheConfig, Expiry, TtlCache};

fn cache<V: serde::Serialize + Send + Sync + 'static>(config: CacheConfig) -> TtlCache<V> {
    TtlCache::new(config.no_check_period())
}

async fn advance(secs: u64) {
    tokio::time::advance(Duration::from_secs(secs)).await;
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn entry_is_live_before_ttl_and_gone_at_ttl() {
    let cache = cache::<String>(CacheConfig::new());
    cache.set_with_ttl("k", "v".to_string(), Duration::from_secs(10));

    advance(9).await;
    assert_eq!(cache.get("k"), Some("v".to_string()));

    advance(1).await;
    assert_eq!(cache.get("k"), None);
    assert!(!cache.has("k"));
}

#[tokio::test(start_paused = true)]
async fn expiry_timer_removes_entry_without_access() {
    let cache = cache::<u32>(CacheConfig::new());
    cache.set_with_ttl("k", 1, Duration::from_secs(5));
    assert_eq!(cache.len(), 1);

    // sleeping lets the paused clock auto-advance through the expiry timer
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.get_stats().keys, 0);
}

#[tokio::test(start_paused = true)]
async fn zero_ttl_never_expires() {
    let cache = cache::<u32>(CacheConfig::new());
    cache.set_with_ttl("forever", 7, Duration::ZERO);

    advance(60 * 60 * 24 * 365).await;
    assert_eq!(cache.get("forever"), Some(7));
    assert_eq!(cache.remaining_ttl("forever"), Some(Expiry::Never));

    assert_eq!(cache.del("forever"), 1);
    assert_eq!(cache.get("forever"), None);
}

#[tokio::test(start_paused = true)]
async fn zero_standard_ttl_means_set_never_expires() {
    let cache = cache::<u32>(CacheConfig::new().std_ttl(Duration::ZERO));
    cache.set("k", 1);
    advance(10_000).await;
    assert_eq!(cache.get("k"), Some(1));
}

#[tokio::test(start_paused = true)]
async fn standard_ttl_applies_to_set() {
    let cache = cache::<u32>(CacheConfig::new().std_ttl(Duration::from_secs(30)));
    cache.set("k", 1);
    assert_eq!(
        cache.remaining_ttl("k"),
        Some(Expiry::After(Duration::from_secs(30)))
    );
    advance(30).await;
    assert_eq!(cache.get("k"), None);
}

#[tokio::test(start_paused = true)]
async fn ttl_reschedules_expiry_from_now() {
    let cache = cache::<u32>(CacheConfig::new());
    cache.set_with_ttl("k", 1, Duration::from_secs(10));

    advance(8).await;
    assert!(cache.ttl("k", Duration::from_secs(10)));

    advance(8).await;
    assert_eq!(cache.get("k"), Some(1));

    advance(2).await;
    assert_eq!(cache.get("k"), None);
    assert!(!cache.ttl("k", Duration::from_secs(10)));
}

#[tokio::test(start_paused = true)]
async fn expired_entries_leave_with_sweep_enabled() {
    let cache = TtlCache::<u32>::new(CacheConfig::new().check_period(Duration::from_secs(60)));
    for i in 0..5 {
        cache.set_with_ttl(format!("k{i}"), i, Duration::from_secs(30));
    }
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(cache.is_empty());
    assert_eq!(cache.purge_expired(), 0);
    cache.close();
}

// ============================================================================
// Capacity
// ============================================================================

#[tokio::test(start_paused = true)]
async fn eviction_is_insertion_order_not_access_order() {
    let cache = cache::<u32>(CacheConfig::new().max_keys(3));
    cache.set("k1", 1);
    cache.set("k2", 2);
    cache.set("k3", 3);

    // reading k1 must not protect it
    assert_eq!(cache.get("k1"), Some(1));

    cache.set("k4", 4);
    assert_eq!(cache.get("k1"), None);
    assert_eq!(cache.get("k2"), Some(2));
    assert_eq!(cache.get("k3"), Some(3));
    assert_eq!(cache.get("k4"), Some(4));
    assert_eq!(cache.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn replacing_existing_key_at_capacity_evicts_nothing() {
    let cache = cache::<u32>(CacheConfig::new().max_keys(2));
    cache.set("a", 1);
    cache.set("b", 2);
    cache.set("a", 10);
    assert_eq!(cache.get("a"), Some(10));
    assert_eq!(cache.get("b"), Some(2));
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_dropped_before_evicting_live_ones() {
    let cache = cache::<u32>(CacheConfig::new().max_keys(2));
    cache.set_with_ttl("old", 1, Duration::ZERO);
    cache.set_with_ttl("short", 2, Duration::from_secs(1));
    advance(2).await;

    cache.set("new", 3);
    assert_eq!(cache.get("old"), Some(1));
    assert_eq!(cache.get("new"), Some(3));
}

#[test]
fn zero_capacity_stores_nothing() {
    let cache = TtlCache::<u32>::new(CacheConfig::new().max_keys(0).no_check_period());
    assert!(!cache.set("k", 1));
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unbounded_cache_keeps_everything() {
    let cache = cache::<usize>(CacheConfig::new().unbounded());
    for i in 0..2_000 {
        cache.set(format!("k{i}"), i);
    }
    assert_eq!(cache.len(), 2_000);
}

// ============================================================================
// Re-insertion and stats
// ============================================================================

#[tokio::test(start_paused = true)]
async fn reinsertion_keeps_key_count_and_uses_new_ttl() {
    let cache = cache::<String>(CacheConfig::new());
    cache.set_with_ttl("k", "first".to_string(), Duration::from_secs(5));
    cache.set_with_ttl("k", "second".to_string(), Duration::from_secs(50));

    let stats = cache.get_stats();
    assert_eq!(stats.keys, 1);
    assert_eq!(stats.ksize, 1);
    assert_eq!(stats.vsize, "\"second\"".len() as u64);

    advance(10).await;
    tokio::task::yield_now().await;
    assert_eq!(cache.get("k"), Some("second".to_string()));

    advance(40).await;
    assert_eq!(cache.get("k"), None);
}

#[tokio::test(start_paused = true)]
async fn hits_and_misses_are_counted() {
    let cache = cache::<u32>(CacheConfig::new());
    cache.set("k", 1);
    cache.get("k");
    cache.get("k");
    cache.get("missing");
    // has() is stats-neutral
    cache.has("k");
    cache.has("missing");

    let stats = cache.get_stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn flush_all_clears_entries_and_stats() {
    let cache = cache::<u32>(CacheConfig::new());
    cache.set("a", 1);
    cache.set("b", 2);
    cache.get("a");

    cache.flush_all();
    assert!(cache.is_empty());
    assert_eq!(cache.get_stats(), Default::default());

    // still usable
    cache.set("c", 3);
    assert_eq!(cache.get("c"), Some(3));
}

#[tokio::test(start_paused = true)]
async fn close_empties_the_cache() {
    let cache = TtlCache::<u32>::new(CacheConfig::new());
    cache.set("a", 1);
    cache.close();
    assert!(cache.is_empty());
}

// ============================================================================
// Reads
// ============================================================================

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct Dish {
    name: String,
    tags: Vec<String>,
}

#[tokio::test(start_paused = true)]
async fn mutating_a_returned_value_does_not_change_the_cache() {
    let cache = cache::<Dish>(CacheConfig::new());
    let original = Dish {
        name: "soup".to_string(),
        tags: vec!["warm".to_string()],
    };
    cache.set("dish", original.clone());

    let mut copy = cache.get("dish").unwrap();
    copy.name.push_str(" (edited)");
    copy.tags.clear();

    assert_eq!(cache.get("dish"), Some(original));
}

#[tokio::test(start_paused = true)]
async fn get_shared_returns_the_stored_value() {
    let cache = cache::<Dish>(CacheConfig::new());
    cache.set(
        "dish",
        Dish {
            name: "stew".to_string(),
            tags: Vec::new(),
        },
    );
    let a = cache.get_shared("dish").unwrap();
    let b = cache.get_shared("dish").unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(cache.get_stats().hits, 2);
}

#[tokio::test(start_paused = true)]
async fn mget_omits_absent_keys() {
    let cache = cache::<u32>(CacheConfig::new());
    cache.set("a", 1);
    cache.set("b", 2);

    let found = cache.mget(["a", "b", "c"]);
    assert_eq!(found.len(), 2);
    assert_eq!(found["a"], 1);
    assert_eq!(found["b"], 2);
    assert!(!found.contains_key("c"));
}

#[tokio::test(start_paused = true)]
async fn keys_are_a_snapshot_in_insertion_order_without_expired() {
    let cache = cache::<u32>(CacheConfig::new());
    cache.set_with_ttl("first", 1, Duration::from_secs(100));
    cache.set_with_ttl("short", 2, Duration::from_secs(1));
    cache.set_with_ttl("last", 3, Duration::from_secs(100));

    advance(2).await;
    let keys = cache.keys();
    assert_eq!(keys, vec!["first".to_string(), "last".to_string()]);

    cache.del("first");
    // the snapshot is unaffected by later changes
    assert_eq!(keys.len(), 2);
    assert_eq!(cache.keys(), vec!["last".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn del_reports_removed_count() {
    let cache = cache::<u32>(CacheConfig::new());
    cache.set("k", 1);
    assert_eq!(cache.del("k"), 1);
    assert_eq!(cache.del("k"), 0);
}

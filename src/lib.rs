//! larder - cached, quota-aware recipe API gateway
//!
//! This crate fronts a daily-quota-limited recipe API with a two-tier TTL
//! cache (memory plus a durable store) and rotates requests across several
//! API keys, tracking each key's usage per local day.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use larder::{Larder, UserProfile};
//! use larder::store::FileStore;
//!
//! #[tokio::main]
//! async fn main() -> larder::Result<()> {
//!     let gateway = Larder::builder()
//!         .api_key("primary", "your-spoonacular-key")
//!         .api_key("backup", "another-key")
//!         .store(Arc::new(FileStore::open(FileStore::default_dir())?))
//!         .build()?;
//!
//!     let profile = UserProfile::new().user("u-42").diet("vegetarian");
//!     for recipe in gateway.search("lasagna", Some(&profile)).await? {
//!         println!("{} ({})", recipe.title, recipe.id);
//!     }
//!
//!     let status = gateway.get_quota_status();
//!     println!("requests left today: {}", status.total_remaining);
//!     Ok(())
//! }
//! ```
//!
//! # Fallbacks
//!
//! [`RecipeService`] wraps a gateway with an unmetered source
//! ([`MealDbClient`](providers::MealDbClient)) and built-in samples for
//! when every key is exhausted.

pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
mod convert;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod quota;
pub mod samples;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheStats, PersistedCache, TtlCache};
pub use error::{LarderError, Result};
pub use gateway::{
    CacheTtls, Larder, LarderBuilder, RecipeGateway, RecipeService, RecipeSource, Sourced,
};
pub use quota::{ApiCredential, KeyRotator, QuotaTracker};
pub use types::{
    CachedPayload, CredentialStatus, Ingredient, ProviderRequest, QuotaStatus, Recipe,
    RecipeOperation, RecipeSummary, UserProfile,
};
pub use version::{PKG_VERSION, version_string};

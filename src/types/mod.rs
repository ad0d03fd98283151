//! Public types for the larder API.

mod profile;
mod recipe;
mod request;
mod status;

pub use profile::UserProfile;
pub use recipe::{CachedPayload, Ingredient, Recipe, RecipeSummary};
pub use request::{ProviderRequest, RecipeOperation};
pub use status::{CredentialStatus, QuotaStatus};

//! Recipe provider implementations.
//!
//! [`SpoonacularClient`] is the keyed provider behind the gateway;
//! [`MealDbClient`] is the unmetered fallback.

pub mod mealdb;
pub mod spoonacular;
pub mod traits;

pub use mealdb::MealDbClient;
pub use spoonacular::SpoonacularClient;
pub use traits::{OpenRecipeSource, RecipeProvider};

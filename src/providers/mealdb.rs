//! TheMealDB client, the unmetered fallback source.
//!
//! The public test key `1` needs no registration and has no daily quota.
//! See: <https://www.themealdb.com/api.php>

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::traits::OpenRecipeSource;
use crate::convert::split_instructions;
use crate::types::{Ingredient, Recipe, RecipeSummary};
use crate::{LarderError, Result};

/// Default base URL for TheMealDB (public test key)
pub const DEFAULT_BASE_URL: &str = "https://www.themealdb.com/api/json/v1/1";

/// Ingredient slots per meal (`strIngredient1` ..= `strIngredient20`).
const INGREDIENT_SLOTS: usize = 20;

/// Client for TheMealDB.
#[derive(Clone)]
pub struct MealDbClient {
    http: Client,
    base_url: String,
}

impl MealDbClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(base_url, Duration::from_secs(15))
    }

    pub fn with_options(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LarderError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_meals(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<RawMeal>> {
        let url = format!("{}/{path}", self.base_url);
        debug!(url = %url, "mealdb request");

        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LarderError::Api {
                status: status.as_u16(),
                message: format!("TheMealDB error: {status}"),
            });
        }

        let page: MealPage = response.json().await?;
        Ok(page.meals.unwrap_or_default())
    }
}

#[async_trait]
impl OpenRecipeSource for MealDbClient {
    fn name(&self) -> &str {
        "mealdb"
    }

    async fn search(&self, query: &str) -> Result<Vec<RecipeSummary>> {
        let meals = self.get_meals("search.php", &[("s", query)]).await?;
        Ok(meals.into_iter().map(|m| m.into_recipe().to_summary()).collect())
    }

    async fn random_one(&self) -> Result<Recipe> {
        self.get_meals("random.php", &[])
            .await?
            .into_iter()
            .next()
            .map(RawMeal::into_recipe)
            .ok_or_else(|| LarderError::MalformedResponse("random.php returned no meal".to_string()))
    }

    async fn details(&self, id: &str) -> Result<Recipe> {
        self.get_meals("lookup.php", &[("i", id)])
            .await?
            .into_iter()
            .next()
            .map(RawMeal::into_recipe)
            .ok_or_else(|| LarderError::NotFound(id.to_string()))
    }
}

#[derive(Deserialize)]
struct MealPage {
    meals: Option<Vec<RawMeal>>,
}

/// A meal object. Ingredient columns are numbered, so fields are read from
/// a flat map.
#[derive(Deserialize)]
struct RawMeal(HashMap<String, Value>);

impl RawMeal {
    fn field(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn into_recipe(self) -> Recipe {
        let ingredients = (1..=INGREDIENT_SLOTS)
            .filter_map(|i| {
                let name = self.field(&format!("strIngredient{i}"))?;
                let measure = self.field(&format!("strMeasure{i}"));
                let original = match &measure {
                    Some(m) => format!("{m} {name}"),
                    None => name.clone(),
                };
                Some(Ingredient {
                    name,
                    amount: None,
                    unit: measure,
                    original: Some(original),
                })
            })
            .collect();

        Recipe {
            id: self.field("idMeal").unwrap_or_default(),
            title: self.field("strMeal").unwrap_or_default(),
            image: self.field("strMealThumb"),
            ready_in_minutes: None,
            servings: None,
            source_url: self.field("strSource"),
            summary: self.field("strCategory"),
            cuisines: self.field("strArea").into_iter().collect(),
            diets: Vec::new(),
            ingredients,
            instructions: self
                .field("strInstructions")
                .as_deref()
                .map(split_instructions)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_ingredients_are_collected_until_blank() {
        let meal: RawMeal = serde_json::from_value(serde_json::json!({
            "idMeal": "52772",
            "strMeal": "Teriyaki Chicken",
            "strIngredient1": "soy sauce",
            "strMeasure1": "3/4 cup",
            "strIngredient2": "water",
            "strMeasure2": " ",
            "strIngredient3": "",
            "strIngredient4": null,
        }))
        .unwrap();
        let recipe = meal.into_recipe();
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].original.as_deref(), Some("3/4 cup soy sauce"));
        assert_eq!(recipe.ingredients[1].unit, None);
    }
}

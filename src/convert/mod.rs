//! Normalisation of keyed-provider responses into larder types.
//!
//! The keyed provider returns camelCase JSON with many more fields than we
//! use. Only the fields carried by [`RecipeSummary`] and [`Recipe`] are
//! read; everything else is ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{CachedPayload, Ingredient, Recipe, RecipeOperation, RecipeSummary};
use crate::{LarderError, Result};

/// Convert a raw provider response for `operation` into the cached payload.
pub fn to_payload(operation: RecipeOperation, raw: Value) -> Result<CachedPayload> {
    match operation {
        RecipeOperation::Personalized | RecipeOperation::Search => {
            Ok(CachedPayload::Summaries(summaries_from_search(raw)?))
        }
        RecipeOperation::Random => Ok(CachedPayload::Summaries(summaries_from_random(raw)?)),
        RecipeOperation::Details => Ok(CachedPayload::Recipe(Box::new(recipe_from_details(raw)?))),
    }
}

/// `complexSearch` responses: `{ "results": [...] }`.
pub fn summaries_from_search(raw: Value) -> Result<Vec<RecipeSummary>> {
    let page: SearchPage = serde_json::from_value(raw)
        .map_err(|e| LarderError::MalformedResponse(format!("search response: {e}")))?;
    Ok(page.results.into_iter().map(RawRecipe::into_summary).collect())
}

/// `random` responses: `{ "recipes": [...] }`.
pub fn summaries_from_random(raw: Value) -> Result<Vec<RecipeSummary>> {
    let page: RandomPage = serde_json::from_value(raw)
        .map_err(|e| LarderError::MalformedResponse(format!("random response: {e}")))?;
    Ok(page.recipes.into_iter().map(RawRecipe::into_summary).collect())
}

/// `{id}/information` responses: a single recipe object.
pub fn recipe_from_details(raw: Value) -> Result<Recipe> {
    let recipe: RawRecipe = serde_json::from_value(raw)
        .map_err(|e| LarderError::MalformedResponse(format!("details response: {e}")))?;
    Ok(recipe.into_recipe())
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<RawRecipe>,
}

#[derive(Deserialize)]
struct RandomPage {
    #[serde(default)]
    recipes: Vec<RawRecipe>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecipe {
    id: Value,
    #[serde(default)]
    title: String,
    image: Option<String>,
    ready_in_minutes: Option<u32>,
    servings: Option<u32>,
    source_url: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    cuisines: Vec<String>,
    #[serde(default)]
    diets: Vec<String>,
    #[serde(default)]
    extended_ingredients: Vec<RawIngredient>,
    #[serde(default)]
    analyzed_instructions: Vec<RawInstructionBlock>,
    instructions: Option<String>,
}

#[derive(Deserialize)]
struct RawIngredient {
    #[serde(default)]
    name: String,
    amount: Option<f64>,
    unit: Option<String>,
    original: Option<String>,
}

#[derive(Deserialize)]
struct RawInstructionBlock {
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    step: String,
}

impl RawRecipe {
    fn id_string(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn into_summary(self) -> RecipeSummary {
        RecipeSummary {
            id: self.id_string(),
            title: self.title,
            image: self.image,
            ready_in_minutes: self.ready_in_minutes,
            servings: self.servings,
            source_url: self.source_url,
        }
    }

    fn into_recipe(self) -> Recipe {
        let id = self.id_string();

        let mut instructions: Vec<String> = self
            .analyzed_instructions
            .into_iter()
            .flat_map(|block| block.steps)
            .map(|s| s.step.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if instructions.is_empty() {
            instructions = self
                .instructions
                .as_deref()
                .map(split_instructions)
                .unwrap_or_default();
        }

        let ingredients = self
            .extended_ingredients
            .into_iter()
            .map(|i| Ingredient {
                name: i.name,
                amount: i.amount,
                unit: i.unit.filter(|u| !u.is_empty()),
                original: i.original,
            })
            .collect();

        Recipe {
            id,
            title: self.title,
            image: self.image,
            ready_in_minutes: self.ready_in_minutes,
            servings: self.servings,
            source_url: self.source_url,
            summary: self.summary.map(|s| strip_tags(&s)),
            cuisines: self.cuisines,
            diets: self.diets,
            ingredients,
            instructions,
        }
    }
}

/// Split free-text (possibly HTML) instructions into non-empty steps.
pub(crate) fn split_instructions(text: &str) -> Vec<String> {
    let text = text
        .replace("</li>", "\n")
        .replace("</p>", "\n")
        .replace("<br>", "\n");
    strip_tags(&text)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

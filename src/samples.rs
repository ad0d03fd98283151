//! Built-in sample recipes.
//!
//! Last-resort data served when every credential is exhausted and the
//! fallback source is unreachable. Ids carry a `sample-` prefix so they
//! never collide with provider ids.

use crate::types::{Ingredient, Recipe, RecipeSummary};

fn ingredient(name: &str, amount: f64, unit: &str) -> Ingredient {
    Ingredient {
        name: name.to_string(),
        amount: Some(amount),
        unit: (!unit.is_empty()).then(|| unit.to_string()),
        original: Some(if unit.is_empty() {
            format!("{amount} {name}")
        } else {
            format!("{amount} {unit} {name}")
        }),
    }
}

fn steps(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

/// All sample recipes.
pub fn sample_recipes() -> Vec<Recipe> {
    vec![
        Recipe {
            id: "sample-1".to_string(),
            title: "Tomato Basil Pasta".to_string(),
            ready_in_minutes: Some(25),
            servings: Some(2),
            summary: Some("A quick weeknight pasta with fresh tomatoes.".to_string()),
            cuisines: vec!["Italian".to_string()],
            diets: vec!["vegetarian".to_string()],
            ingredients: vec![
                ingredient("spaghetti", 200.0, "g"),
                ingredient("cherry tomatoes", 250.0, "g"),
                ingredient("garlic cloves", 2.0, ""),
                ingredient("basil leaves", 10.0, ""),
                ingredient("olive oil", 2.0, "tbsp"),
            ],
            instructions: steps(&[
                "Cook the spaghetti in salted water until al dente.",
                "Fry the sliced garlic in olive oil, add the halved tomatoes and cook for 5 minutes.",
                "Toss the pasta with the sauce and torn basil.",
            ]),
            ..Recipe::default()
        },
        Recipe {
            id: "sample-2".to_string(),
            title: "Chickpea Curry".to_string(),
            ready_in_minutes: Some(35),
            servings: Some(4),
            summary: Some("A mild, creamy curry from pantry staples.".to_string()),
            cuisines: vec!["Indian".to_string()],
            diets: vec!["vegan".to_string(), "gluten free".to_string()],
            ingredients: vec![
                ingredient("chickpeas", 800.0, "g"),
                ingredient("coconut milk", 400.0, "ml"),
                ingredient("onion", 1.0, ""),
                ingredient("curry powder", 2.0, "tbsp"),
                ingredient("spinach", 100.0, "g"),
            ],
            instructions: steps(&[
                "Soften the chopped onion in a little oil.",
                "Stir in the curry powder, then the chickpeas and coconut milk.",
                "Simmer for 20 minutes and wilt in the spinach.",
            ]),
            ..Recipe::default()
        },
        Recipe {
            id: "sample-3".to_string(),
            title: "Lemon Herb Chicken".to_string(),
            ready_in_minutes: Some(45),
            servings: Some(4),
            summary: Some("Roast chicken thighs with lemon and thyme.".to_string()),
            cuisines: vec!["Mediterranean".to_string()],
            diets: vec!["gluten free".to_string(), "dairy free".to_string()],
            ingredients: vec![
                ingredient("chicken thighs", 8.0, ""),
                ingredient("lemon", 1.0, ""),
                ingredient("thyme sprigs", 4.0, ""),
                ingredient("olive oil", 2.0, "tbsp"),
            ],
            instructions: steps(&[
                "Heat the oven to 200C.",
                "Toss the chicken with oil, lemon juice, zest and thyme.",
                "Roast for 35 minutes until golden.",
            ]),
            ..Recipe::default()
        },
        Recipe {
            id: "sample-4".to_string(),
            title: "Overnight Oats".to_string(),
            ready_in_minutes: Some(5),
            servings: Some(1),
            summary: Some("No-cook breakfast prepared the night before.".to_string()),
            diets: vec!["vegetarian".to_string()],
            ingredients: vec![
                ingredient("rolled oats", 50.0, "g"),
                ingredient("milk", 150.0, "ml"),
                ingredient("yogurt", 2.0, "tbsp"),
                ingredient("berries", 80.0, "g"),
            ],
            instructions: steps(&[
                "Mix the oats, milk and yogurt in a jar.",
                "Refrigerate overnight and top with berries.",
            ]),
            ..Recipe::default()
        },
        Recipe {
            id: "sample-5".to_string(),
            title: "Black Bean Tacos".to_string(),
            ready_in_minutes: Some(20),
            servings: Some(3),
            summary: Some("Smoky beans in warm tortillas.".to_string()),
            cuisines: vec!["Mexican".to_string()],
            diets: vec!["vegan".to_string()],
            ingredients: vec![
                ingredient("black beans", 400.0, "g"),
                ingredient("corn tortillas", 6.0, ""),
                ingredient("smoked paprika", 1.0, "tsp"),
                ingredient("avocado", 1.0, ""),
                ingredient("lime", 1.0, ""),
            ],
            instructions: steps(&[
                "Warm the beans with paprika and a splash of water, mashing lightly.",
                "Heat the tortillas in a dry pan.",
                "Fill with beans and sliced avocado, finish with lime.",
            ]),
            ..Recipe::default()
        },
    ]
}

/// Sample recipe by id.
pub fn find_sample(id: &str) -> Option<Recipe> {
    sample_recipes().into_iter().find(|r| r.id == id)
}

/// Samples whose title, cuisine, diet or ingredients contain `query`
/// (case-insensitive). An empty query matches everything.
pub fn search_samples(query: &str) -> Vec<RecipeSummary> {
    let needle = query.trim().to_lowercase();
    sample_recipes()
        .iter()
        .filter(|r| {
            needle.is_empty()
                || r.title.to_lowercase().contains(&needle)
                || r.cuisines.iter().any(|c| c.to_lowercase().contains(&needle))
                || r.diets.iter().any(|d| d.to_lowercase().contains(&needle))
                || r.ingredients
                    .iter()
                    .any(|i| i.name.to_lowercase().contains(&needle))
        })
        .map(Recipe::to_summary)
        .collect()
}

/// The first `count` samples.
pub fn sample_summaries(count: usize) -> Vec<RecipeSummary> {
    sample_recipes()
        .iter()
        .take(count)
        .map(Recipe::to_summary)
        .collect()
}

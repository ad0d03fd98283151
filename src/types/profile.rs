//! User dietary profile

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cache::ParamValue;

/// Preferences used to personalise recipe queries.
///
/// `user_id` scopes cache keys so personalised results are never shared
/// between users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet: Option<String>,
    #[serde(default)]
    pub intolerances: Vec<String>,
    #[serde(default)]
    pub cuisines: Vec<String>,
    #[serde(default)]
    pub exclude_ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ready_time: Option<u32>,
}

impl UserProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    pub fn diet(mut self, diet: impl Into<String>) -> Self {
        self.diet = Some(diet.into());
        self
    }

    pub fn intolerance(mut self, item: impl Into<String>) -> Self {
        self.intolerances.push(item.into());
        self
    }

    pub fn cuisine(mut self, cuisine: impl Into<String>) -> Self {
        self.cuisines.push(cuisine.into());
        self
    }

    pub fn exclude(mut self, ingredient: impl Into<String>) -> Self {
        self.exclude_ingredients.push(ingredient.into());
        self
    }

    pub fn max_ready_time(mut self, minutes: u32) -> Self {
        self.max_ready_time = Some(minutes);
        self
    }

    /// Cache scope for this profile's results.
    pub fn scope(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Whether the profile constrains queries at all.
    pub fn is_empty(&self) -> bool {
        self.diet.is_none()
            && self.intolerances.is_empty()
            && self.cuisines.is_empty()
            && self.exclude_ingredients.is_empty()
            && self.max_ready_time.is_none()
    }

    /// Query parameters in the keyed provider's vocabulary. Empty fields are
    /// omitted.
    pub fn query_params(&self) -> BTreeMap<String, ParamValue> {
        let mut params = BTreeMap::new();
        if let Some(diet) = &self.diet {
            params.insert("diet".to_string(), ParamValue::from(diet.as_str()));
        }
        let lists = [
            ("intolerances", &self.intolerances),
            ("cuisine", &self.cuisines),
            ("excludeIngredients", &self.exclude_ingredients),
        ];
        for (name, items) in lists {
            if !items.is_empty() {
                params.insert(name.to_string(), ParamValue::List(items.clone()));
            }
        }
        if let Some(minutes) = self.max_ready_time {
            params.insert("maxReadyTime".to_string(), ParamValue::from(minutes));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_omitted() {
        let params = UserProfile::new().diet("vegan").query_params();
        assert_eq!(params.len(), 1);
        assert_eq!(params["diet"], ParamValue::from("vegan"));
    }

    #[test]
    fn user_id_is_not_a_query_param() {
        let profile = UserProfile::new().user("u1");
        assert!(profile.query_params().is_empty());
        assert!(profile.is_empty());
        assert_eq!(profile.scope(), Some("u1"));
    }
}

//! Provider request description

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::ParamValue;

/// Gateway operation kinds. Each has its own cache TTL and provider
/// endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeOperation {
    Personalized,
    Search,
    Random,
    Details,
}

impl RecipeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeOperation::Personalized => "personalized",
            RecipeOperation::Search => "search",
            RecipeOperation::Random => "random",
            RecipeOperation::Details => "details",
        }
    }
}

impl fmt::Display for RecipeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call against a keyed provider: an operation plus its parameters.
///
/// The same value feeds cache-key derivation and the outbound query.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub operation: RecipeOperation,
    pub params: BTreeMap<String, ParamValue>,
}

impl ProviderRequest {
    pub fn new(operation: RecipeOperation) -> Self {
        Self {
            operation,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: BTreeMap<String, ParamValue>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Parameters rendered as query-string pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

//! Spoonacular recipe API client.
//!
//! Authenticates with an `apiKey` query parameter. The free tier allows a
//! fixed number of "points" per day; when they run out the API answers 402,
//! and bursts are refused with 429. Both are reported as quota rejections.
//! See: <https://spoonacular.com/food-api/docs>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::traits::RecipeProvider;
use crate::cache::ParamValue;
use crate::types::{ProviderRequest, RecipeOperation};
use crate::{LarderError, Result};

/// Default base URL for the Spoonacular API
pub const DEFAULT_BASE_URL: &str = "https://api.spoonacular.com";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the Spoonacular recipe API.
#[derive(Clone)]
pub struct SpoonacularClient {
    http: Client,
    base_url: String,
}

impl SpoonacularClient {
    /// Create a client for the public API.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(base_url, DEFAULT_TIMEOUT)
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

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL and query pairs for `request`, without the key.
    fn endpoint(&self, request: &ProviderRequest) -> Result<(String, Vec<(String, String)>)> {
        match request.operation {
            RecipeOperation::Personalized | RecipeOperation::Search => Ok((
                format!("{}/recipes/complexSearch", self.base_url),
                request.query_pairs(),
            )),
            RecipeOperation::Random => Ok((
                format!("{}/recipes/random", self.base_url),
                request.query_pairs(),
            )),
            RecipeOperation::Details => {
                // ids are spliced into the path, so only plain numbers pass
                let id = match request.get("id") {
                    Some(ParamValue::Str(id))
                        if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) =>
                    {
                        id.clone()
                    }
                    Some(ParamValue::Int(id)) if *id >= 0 => id.to_string(),
                    Some(_) => {
                        return Err(LarderError::InvalidInput(
                            "recipe id must be numeric".to_string(),
                        ));
                    }
                    None => {
                        return Err(LarderError::InvalidInput(
                            "details request needs an id".to_string(),
                        ));
                    }
                };
                let query = request
                    .query_pairs()
                    .into_iter()
                    .filter(|(k, _)| k != "id")
                    .collect();
                Ok((format!("{}/recipes/{id}/information", self.base_url), query))
            }
        }
    }
}

#[async_trait]
impl RecipeProvider for SpoonacularClient {
    fn name(&self) -> &str {
        "spoonacular"
    }

    async fn fetch(&self, request: &ProviderRequest, api_key: &str) -> Result<Value> {
        let (url, query) = self.endpoint(request)?;
        debug!(operation = %request.operation, url = %url, "spoonacular request");

        let response = self
            .http
            .get(&url)
            .query(&query)
            .query(&[("apiKey", api_key)])
            .send()
            .await?;

        let response = handle_response_errors(response, request).await?;
        Ok(response.json().await?)
    }
}

/// Check response status and map to the appropriate error.
async fn handle_response_errors(
    response: reqwest::Response,
    request: &ProviderRequest,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| format!("Spoonacular API error: {status}"));

    match status.as_u16() {
        402 => Err(LarderError::ProviderQuotaRejected {
            credential: None,
            message,
        }),
        429 if mentions_quota(&body) => Err(LarderError::ProviderQuotaRejected {
            credential: None,
            message,
        }),
        401 => Err(LarderError::AuthenticationFailed),
        404 => Err(LarderError::NotFound(
            request
                .get("id")
                .map(|id| id.to_string())
                .unwrap_or_else(|| request.operation.to_string()),
        )),
        code => Err(LarderError::Api {
            status: code,
            message,
        }),
    }
}

/// The `message` field of a JSON error body, if any.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}

fn mentions_quota(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    ["quota", "limit", "points"]
        .iter()
        .any(|needle| body.contains(needle))
}

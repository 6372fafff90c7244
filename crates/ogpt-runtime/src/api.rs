//! Endpoints of the model server and the non-streaming tag listing.

use ogpt_core::ListError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Thin client for the model server's HTTP API.
#[derive(Debug, Clone)]
pub struct OllamaApiClient {
    client: Client,
    base_url: String,
}

impl OllamaApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn pull_url(&self) -> String {
        format!("{}/api/pull", self.base_url)
    }

    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    pub fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    /// `GET /api/tags` and return the model names in server order.
    pub async fn list_models(&self) -> Result<Vec<String>, ListError> {
        let url = self.tags_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ListError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ListError::Api(format!("{url} returned HTTP {}", status.as_u16())));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ListError::Api(e.to_string()))?;
        debug!(count = tags.models.len(), "Fetched model tags");
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// Body of `POST /api/pull`.
pub fn pull_payload(name: &str) -> Value {
    json!({ "name": name, "stream": true })
}

/// Body of `POST /api/generate`.
pub fn generate_payload(model: &str, prompt: &str) -> Value {
    json!({ "model": model, "prompt": prompt, "stream": true })
}

//! OpenAI embeddings API provider.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use context_indexer_core::embedding::{json_to_vector, EmbeddingProvider};

use crate::config::EmbeddingConfig;

const DEFAULT_URL: &str = "https://api.openai.com/v1";

/// Embedding provider using the OpenAI API.
///
/// Calls `POST {url}/embeddings` with the configured model. Credentials come
/// from `embedding.api_key`, falling back to the `OPENAI_API_KEY`
/// environment variable. Each call is a single attempt; the client wraps it
/// in retry.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config, or if no
    /// API key is configured or present in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?,
        };
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            url,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dims,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_openai_response(&json, self.dims)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts `data[].embedding` arrays, validates their dimensionality, and
/// returns them ordered by `data[].index`.
pub(crate) fn parse_openai_response(
    json: &serde_json::Value,
    dims: usize,
) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let raw = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let vector = json_to_vector(raw, dims).ok_or_else(|| {
            anyhow!("Invalid OpenAI response: embedding is not a {dims}-dimensional array")
        })?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

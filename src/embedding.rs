//! Embedding providers for the dense backend.
//!
//! - **`hashing`**: [`HashingEmbedder`](docuquery_core::embedding::HashingEmbedder)
//!   from the core crate. Local and deterministic; no network calls.
//! - **`openai`**: [`OpenAIEmbedder`] calls an OpenAI-compatible
//!   `POST {url}/embeddings` endpoint with batching, retry, and backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use docuquery_core::embedding::{EmbeddingProvider, HashingEmbedder};
use docuquery_core::ProviderError;

use crate::config::EmbeddingConfig;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Build the provider named by `embedding.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashing" => {
            let dims = config.effective_dims().unwrap_or(0);
            if dims == 0 {
                bail!("embedding.dims must be > 0 for the hashing provider");
            }
            Ok(Arc::new(HashingEmbedder::new(dims)))
        }
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        other => bail!(
            "Unknown embedding provider: '{}'. Must be hashing or openai.",
            other
        ),
    }
}

/// Embedding provider for OpenAI-compatible APIs.
///
/// The API key is read from the environment variable named by
/// `embedding.api_key_env` when the provider is built. Servers that need
/// no key (a local Ollama `/v1`) work with the variable unset as long as
/// `url` is configured.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;

        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() && config.url.is_none() {
            bail!("{} environment variable not set", config.api_key_env);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            model,
            dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let endpoint = format!("{}/embeddings", self.url.trim_end_matches('/'));

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let mut req = self.client.post(&endpoint).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
                        return parse_embeddings(&json, texts.len(), self.dims);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err =
                        ProviderError::Unavailable(format!("embedding API error {}: {}", status, body_text));
                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) if e.is_timeout() => {
                    last_err = Some(ProviderError::Unavailable(format!(
                        "embedding request timed out: {}",
                        e
                    )));
                }
                Err(e) => {
                    last_err = Some(ProviderError::Unavailable(format!(
                        "embedding connection error ({}): {}",
                        self.url, e
                    )));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ProviderError::Unavailable("embedding failed after retries".to_string())))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}

/// Parse an embeddings response: `data[].embedding`, ordered by `data[].index`.
fn parse_embeddings(
    json: &serde_json::Value,
    expected: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let invalid = |what: &str| ProviderError::Unavailable(format!("invalid embedding response: {}", what));

    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| invalid("missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| invalid("missing embedding"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        if vec.len() != dims {
            return Err(invalid(&format!(
                "expected {} dimensions, got {}",
                dims,
                vec.len()
            )));
        }
        indexed.push((index, vec));
    }

    if indexed.len() != expected {
        return Err(invalid(&format!(
            "expected {} embeddings, got {}",
            expected,
            indexed.len()
        )));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

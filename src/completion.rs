//! Completion providers for generative answers.
//!
//! [`OpenAIChat`] speaks the OpenAI `POST {url}/chat/completions`
//! protocol, which also covers Ollama's `/v1` endpoint. Requests are not
//! retried: the answer composer already bounds the call with a timeout and
//! falls back per its policy.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use docuquery_core::completion::{CompletionOptions, CompletionProvider};
use docuquery_core::compose::AnswerComposer;
use docuquery_core::config::EngineConfig;
use docuquery_core::ProviderError;

use crate::config::CompletionConfig;
use crate::embedding::DEFAULT_OPENAI_URL;

pub struct OpenAIChat {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAIChat {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenAI provider"))?;
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() && config.url.is_none() {
            bail!("{} environment variable not set", config.api_key_env);
        }
        // Slightly longer than the composer's own timeout so that one fires first.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs + 5))
            .build()?;
        Ok(Self {
            client,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": options.temperature,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let endpoint = format!("{}/chat/completions", self.url.trim_end_matches('/'));
        let mut req = self.client.post(&endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            ProviderError::Unavailable(format!("completion connection error ({}): {}", self.url, e))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!(
                "completion API error {}: {}",
                status, body_text
            )));
        }
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String, ProviderError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::Unavailable("invalid completion response: missing content".to_string())
        })
}

/// Build the answer composer for `[completion]`: extractive when the
/// provider is disabled, generative otherwise.
pub fn create_composer(config: &CompletionConfig, engine: &EngineConfig) -> Result<AnswerComposer> {
    let thresholds = engine.ranking.thresholds;
    match config.provider.as_str() {
        "disabled" => Ok(AnswerComposer::extractive(&engine.answer, thresholds)),
        "openai" => {
            let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAIChat::new(config)?);
            let options = CompletionOptions {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            };
            Ok(AnswerComposer::generative(&engine.answer, thresholds, provider, options))
        }
        other => bail!(
            "Unknown completion provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
}

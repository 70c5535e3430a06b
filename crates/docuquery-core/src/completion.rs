//! Completion provider trait.
//!
//! The generative answer strategy hands a prompt to a
//! [`CompletionProvider`] and uses the returned text as the answer body.
//! The engine enforces its own timeout around every call and never
//! retries; retry policy belongs to whoever wraps the provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Generation options forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: None,
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider label reported in answers and config dumps.
    fn name(&self) -> &str;

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError>;
}

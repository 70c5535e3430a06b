//! TOML configuration for the `dq` binary and server.
//!
//! Every section is optional; missing keys fall back to the defaults
//! below. [`load_config`] parses and validates a file, and
//! [`Config::minimal`] gives the defaults for commands run without one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use docuquery_core::config::{
    AnswerConfig, BackendKind, ChunkParams, ConfidenceThresholds, EngineConfig, FallbackPolicy, LexicalConfig,
    RankingConfig,
};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    /// Drop stop words when building the lexical vocabulary.
    #[serde(default)]
    pub stop_words: bool,
    #[serde(default = "default_highlights")]
    pub highlights: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            min_score: None,
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            stop_words: false,
            highlights: default_highlights(),
        }
    }
}

fn default_backend() -> String {
    "lexical".to_string()
}
fn default_top_k() -> usize {
    4
}
fn default_max_top_k() -> usize {
    10
}
fn default_high_threshold() -> f64 {
    0.5
}
fn default_medium_threshold() -> f64 {
    0.2
}
fn default_highlights() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hashing".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

/// Dimensions used by the hashing embedder when `dims` is unset.
pub const DEFAULT_HASHING_DIMS: usize = 384;

impl EmbeddingConfig {
    /// Configured dimensions, with the hashing default applied.
    pub fn effective_dims(&self) -> Option<usize> {
        match (self.provider.as_str(), self.dims) {
            (_, Some(d)) => Some(d),
            ("hashing", None) => Some(DEFAULT_HASHING_DIMS),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_fallback")]
    pub fallback: String,
    #[serde(default = "default_max_answer_chars")]
    pub max_answer_chars: usize,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: None,
            url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_completion_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: None,
            fallback: default_fallback(),
            max_answer_chars: default_max_answer_chars(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

fn default_completion_provider() -> String {
    "disabled".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.3
}
fn default_fallback() -> String {
    "extractive".to_string()
}
fn default_max_answer_chars() -> usize {
    4000
}
fn default_max_prompt_chars() -> usize {
    12_000
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted upload body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Config {
    /// All defaults: lexical backend, extractive answers.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn backend(&self) -> Result<BackendKind> {
        match self.retrieval.backend.as_str() {
            "lexical" => Ok(BackendKind::Lexical),
            "dense" => Ok(BackendKind::Dense),
            other => anyhow::bail!(
                "Unknown retrieval backend: '{}'. Must be lexical or dense.",
                other
            ),
        }
    }

    pub fn fallback(&self) -> Result<FallbackPolicy> {
        match self.completion.fallback.as_str() {
            "extractive" => Ok(FallbackPolicy::Extractive),
            "fail" => Ok(FallbackPolicy::Fail),
            other => anyhow::bail!(
                "Unknown completion fallback: '{}'. Must be extractive or fail.",
                other
            ),
        }
    }

    /// Build the engine configuration the corpus manager runs with.
    pub fn engine(&self) -> Result<EngineConfig> {
        let chunking = ChunkParams::new(self.chunking.chunk_size, self.chunking.overlap)
            .context("Invalid [chunking] section")?;
        let thresholds =
            ConfidenceThresholds::new(self.retrieval.high_threshold, self.retrieval.medium_threshold)
                .context("Invalid confidence thresholds in [retrieval]")?;

        let engine = EngineConfig {
            backend: self.backend()?,
            chunking,
            ranking: RankingConfig {
                thresholds,
                highlights: self.retrieval.highlights,
                ..RankingConfig::default()
            },
            lexical: LexicalConfig {
                stop_words: self.retrieval.stop_words,
                ..LexicalConfig::default()
            },
            answer: AnswerConfig {
                max_answer_chars: self.completion.max_answer_chars,
                max_prompt_chars: self.completion.max_prompt_chars,
                completion_timeout: Duration::from_secs(self.completion.timeout_secs),
                fallback: self.fallback()?,
            },
            default_top_k: self.retrieval.top_k,
            max_top_k: self.retrieval.max_top_k,
            min_score: self.retrieval.min_score,
        };
        engine.validate().context("Invalid engine configuration")?;
        Ok(engine)
    }

    /// Check everything [`load_config`] promises before anything starts.
    pub fn validate(&self) -> Result<()> {
        let engine = self.engine()?;

        match self.embedding.provider.as_str() {
            "hashing" | "openai" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be hashing or openai.",
                other
            ),
        }
        if engine.backend == BackendKind::Dense {
            match self.embedding.effective_dims() {
                None | Some(0) => anyhow::bail!(
                    "embedding.dims must be > 0 when retrieval.backend is 'dense' and provider is '{}'",
                    self.embedding.provider
                ),
                Some(_) => {}
            }
            if self.embedding.provider == "openai" && self.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified when provider is 'openai'");
            }
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }

        match self.completion.provider.as_str() {
            "disabled" | "openai" => {}
            other => anyhow::bail!(
                "Unknown completion provider: '{}'. Must be disabled or openai.",
                other
            ),
        }
        if self.completion.is_enabled() && self.completion.model.is_none() {
            anyhow::bail!(
                "completion.model must be specified when provider is '{}'",
                self.completion.provider
            );
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Config> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        let engine = config.engine().unwrap();
        assert_eq!(engine.chunking.chunk_size(), 1000);
        assert_eq!(engine.chunking.overlap(), 200);
        assert_eq!(engine.default_top_k, 4);
        assert_eq!(engine.max_top_k, 10);
        assert_eq!(engine.backend, BackendKind::Lexical);
        assert_eq!(engine.answer.fallback, FallbackPolicy::Extractive);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
[chunking]
chunk_size = 500
overlap = 50

[retrieval]
backend = "dense"
top_k = 3
min_score = 0.05
high_threshold = 0.7
medium_threshold = 0.3

[embedding]
provider = "hashing"
dims = 128

[completion]
provider = "openai"
model = "llama3"
url = "http://localhost:11434/v1"
fallback = "fail"
timeout_secs = 5

[server]
bind = "0.0.0.0:9000"
"#,
        )
        .unwrap();
        let engine = config.engine().unwrap();
        assert_eq!(engine.backend, BackendKind::Dense);
        assert_eq!(engine.chunking.step(), 450);
        assert_eq!(engine.min_score, Some(0.05));
        assert_eq!(engine.answer.fallback, FallbackPolicy::Fail);
        assert_eq!(engine.answer.completion_timeout, Duration::from_secs(5));
        assert_eq!(config.embedding.effective_dims(), Some(128));
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk_size() {
        let err = parse("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(format!("{:#}", err).contains("chunking"));
    }

    #[test]
    fn test_thresholds_out_of_order() {
        assert!(parse("[retrieval]\nhigh_threshold = 0.2\nmedium_threshold = 0.5\n").is_err());
    }

    #[test]
    fn test_top_k_out_of_range() {
        assert!(parse("[retrieval]\ntop_k = 0\n").is_err());
        assert!(parse("[retrieval]\ntop_k = 11\n").is_err());
    }

    #[test]
    fn test_unknown_names() {
        assert!(parse("[retrieval]\nbackend = \"bm25\"\n").is_err());
        assert!(parse("[embedding]\nprovider = \"cohere\"\n").is_err());
        assert!(parse("[completion]\nprovider = \"gemini\"\nmodel = \"x\"\n").is_err());
        assert!(parse("[completion]\nfallback = \"retry\"\n").is_err());
    }

    #[test]
    fn test_dense_openai_requires_dims_and_model() {
        assert!(parse("[retrieval]\nbackend = \"dense\"\n[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse(
            "[retrieval]\nbackend = \"dense\"\n[embedding]\nprovider = \"openai\"\ndims = 1536\n"
        )
        .is_err());
        assert!(parse(
            "[retrieval]\nbackend = \"dense\"\n[embedding]\nprovider = \"openai\"\ndims = 1536\nmodel = \"text-embedding-3-small\"\n"
        )
        .is_ok());
    }

    #[test]
    fn test_completion_requires_model() {
        assert!(parse("[completion]\nprovider = \"openai\"\n").is_err());
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dq.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 2\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.retrieval.top_k, 2);
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}

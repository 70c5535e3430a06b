//! Engine configuration.
//!
//! All tunables are carried in an [`EngineConfig`] handed to
//! [`CorpusManager::new`](crate::corpus::CorpusManager::new); nothing is
//! read from ambient state. Invalid values are rejected up front with
//! [`CoreError::Configuration`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::Confidence;

/// Character window size and overlap for the chunker.
///
/// Only constructible through [`ChunkParams::new`], so a value in hand
/// always has `0 <= overlap < chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CoreError::Configuration(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(CoreError::Configuration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive passage starts. Always positive.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Score cut-offs for the three confidence buckets.
///
/// `score >= high` is high, `medium <= score < high` is medium, anything
/// else is low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
}

impl ConfidenceThresholds {
    pub fn new(high: f64, medium: f64) -> Result<Self> {
        let t = Self { high, medium };
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.high.is_finite() || !self.medium.is_finite() {
            return Err(CoreError::Configuration(
                "confidence thresholds must be finite".to_string(),
            ));
        }
        if self.medium > self.high {
            return Err(CoreError::Configuration(format!(
                "medium threshold ({}) must not exceed high threshold ({})",
                self.medium, self.high
            )));
        }
        Ok(())
    }

    pub fn bucket(&self, score: f64) -> Confidence {
        if score >= self.high {
            Confidence::High
        } else if score >= self.medium {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.5,
            medium: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    pub thresholds: ConfidenceThresholds,
    /// Compute highlight spans for returned passages.
    pub highlights: bool,
    /// Query terms shorter than this are never highlighted.
    pub highlight_min_term_len: usize,
    pub exclude_stop_words: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            thresholds: ConfidenceThresholds::default(),
            highlights: true,
            highlight_min_term_len: 3,
            exclude_stop_words: true,
        }
    }
}

/// Tokenization settings for the TF-IDF backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalConfig {
    pub min_token_len: usize,
    pub stop_words: bool,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            min_token_len: 2,
            stop_words: false,
        }
    }
}

/// Similarity backend selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Lexical,
    Dense,
}

/// What to do when the generative strategy fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Return an extractive answer and record why.
    Extractive,
    /// Surface `CompositionUnavailable` to the caller.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerConfig {
    pub max_answer_chars: usize,
    pub max_prompt_chars: usize,
    pub completion_timeout: Duration,
    pub fallback: FallbackPolicy,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            max_answer_chars: 4000,
            max_prompt_chars: 12_000,
            completion_timeout: Duration::from_secs(60),
            fallback: FallbackPolicy::Extractive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub backend: BackendKind,
    pub chunking: ChunkParams,
    pub ranking: RankingConfig,
    pub lexical: LexicalConfig,
    pub answer: AnswerConfig,
    pub default_top_k: usize,
    pub max_top_k: usize,
    /// Drop ranked passages scoring below this value.
    pub min_score: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Lexical,
            chunking: ChunkParams::default(),
            ranking: RankingConfig::default(),
            lexical: LexicalConfig::default(),
            answer: AnswerConfig::default(),
            default_top_k: 4,
            max_top_k: 10,
            min_score: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.ranking.thresholds.validate()?;
        if self.max_top_k == 0 {
            return Err(CoreError::Configuration(
                "max_top_k must be >= 1".to_string(),
            ));
        }
        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            return Err(CoreError::Configuration(format!(
                "default_top_k must be in 1..={}",
                self.max_top_k
            )));
        }
        if self.answer.max_answer_chars == 0 || self.answer.max_prompt_chars == 0 {
            return Err(CoreError::Configuration(
                "answer length limits must be > 0".to_string(),
            ));
        }
        if self.answer.completion_timeout.is_zero() {
            return Err(CoreError::Configuration(
                "completion timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

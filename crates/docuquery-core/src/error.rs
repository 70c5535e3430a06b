//! Error taxonomy for the retrieval engine.
//!
//! Every failure the engine can surface to a caller is a [`CoreError`]
//! variant. Expected conditions (an empty document, an unknown id, a query
//! with nothing to answer from) are ordinary values, never panics.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Failure reported by an external provider (completion or embedding).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// The provider could not be reached or rejected the request.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// The provider did not answer within the allotted time.
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid engine configuration (chunk size, overlap, thresholds).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Extracted text was empty after trimming.
    #[error("document is empty or unreadable")]
    EmptyDocument,

    /// No document with the given id exists in the corpus.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A document filter referenced ids that are not in the corpus.
    #[error("unknown document ids in filter: {}", .0.join(", "))]
    InvalidFilter(Vec<String>),

    /// Query text or parameters were rejected before retrieval.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Nothing in the (filtered) corpus could back an answer.
    #[error("no relevant content found for the query")]
    NoRelevantContent,

    /// The generative strategy could not produce an answer.
    #[error("answer composition unavailable: {0}")]
    CompositionUnavailable(#[source] ProviderError),

    /// The embedding provider failed while indexing or querying.
    #[error("embedding failed: {0}")]
    Embedding(#[source] ProviderError),

    /// Building a new index generation failed; the previous one stays live.
    #[error("index rebuild failed: {0}")]
    IndexBuild(String),
}

impl CoreError {
    /// Stable machine-readable code, used by API layers for error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Configuration(_) => "configuration_error",
            CoreError::EmptyDocument => "empty_document",
            CoreError::NotFound(_) => "not_found",
            CoreError::InvalidFilter(_) => "invalid_filter",
            CoreError::InvalidQuery(_) => "bad_request",
            CoreError::NoRelevantContent => "no_relevant_content",
            CoreError::CompositionUnavailable(ProviderError::Timeout(_)) => "provider_timeout",
            CoreError::CompositionUnavailable(_) => "composition_unavailable",
            CoreError::Embedding(_) => "embedding_failed",
            CoreError::IndexBuild(_) => "index_build_failed",
        }
    }
}

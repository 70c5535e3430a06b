//! Core data models shared by the chunker, index, ranker, and composer.
//!
//! Offsets (`start`, `end`, highlight spans) are measured in Unicode
//! scalar values (`char`s), not bytes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a document's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Pdf,
    Docx,
    PlainText,
    DirectInput,
}

impl SourceKind {
    /// Short uppercase label shown in document listings.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Pdf => "PDF",
            SourceKind::Docx => "DOCX",
            SourceKind::PlainText => "TXT",
            SourceKind::DirectInput => "TEXT",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifier of a passage: owning document plus zero-based sequence index.
///
/// Ordering is by document id, then sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PassageId {
    pub document_id: String,
    pub sequence: usize,
}

impl PassageId {
    pub fn new(document_id: impl Into<String>, sequence: usize) -> Self {
        Self {
            document_id: document_id.into(),
            sequence,
        }
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.sequence)
    }
}

/// A contiguous slice of a document's text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    /// Inclusive start offset into the document text.
    pub start: usize,
    /// Exclusive end offset into the document text.
    pub end: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Passage {
    pub fn document_id(&self) -> &str {
        &self.id.document_id
    }

    pub fn sequence(&self) -> usize {
        self.id.sequence
    }
}

/// Input to [`CorpusManager::ingest`](crate::corpus::CorpusManager::ingest).
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub kind: SourceKind,
    pub text: String,
}

/// An ingested document. Immutable after ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub kind: SourceKind,
    /// Normalized text the passages were cut from.
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub passage_ids: Vec<PassageId>,
}

/// Listing entry for a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub kind: SourceKind,
    pub char_count: usize,
    pub passage_count: usize,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

/// A document together with its passages, in sequence order.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub document: Document,
    pub passages: Vec<Passage>,
}

/// Discretized confidence derived from a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        })
    }
}

/// Half-open `[start, end)` character range inside a passage's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One ranked query result. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPassage {
    pub passage_id: PassageId,
    pub document_title: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
    pub confidence: Confidence,
    pub highlights: Vec<Span>,
    pub text: String,
}

/// Which answer strategy produced an [`Answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Extractive,
    Generative,
}

/// Final answer with the passages that back it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub text: String,
    pub sources: Vec<RankedPassage>,
    /// Aggregate confidence: the top source's score clamped to `[0, 1]`.
    pub confidence: f64,
    pub confidence_label: Confidence,
    pub strategy: StrategyKind,
    /// Set when the fallback policy replaced a failed generative answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

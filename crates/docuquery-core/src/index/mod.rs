//! Passage index: similarity search over the current passage corpus.
//!
//! Two interchangeable backends implement [`SimilarityBackend`]:
//!
//! | Backend | Representation | Mutation cost |
//! |---------|----------------|---------------|
//! | [`LexicalBackend`] | TF-IDF sparse vectors | full corpus rebuild on every add/remove |
//! | [`DenseBackend`] | provider embeddings | independent insert/delete |
//!
//! The TF-IDF vocabulary and IDF weights are corpus-wide statistics, so
//! the lexical backend re-derives its whole vector space whenever the
//! passage set changes. Both backends build the next state off to the side
//! and only replace the live one once construction succeeded; a failed
//! mutation leaves the previous state searchable.
//!
//! Callers serialize mutations against searches (see
//! [`CorpusManager`](crate::corpus::CorpusManager)); backends themselves
//! take `&mut self` for writes and `&self` for reads.

pub mod dense;
pub mod lexical;

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{BackendKind, LexicalConfig};
use crate::error::Result;
use crate::models::{Passage, PassageId};

pub use dense::DenseBackend;
pub use lexical::LexicalBackend;

/// A passage handed to [`SimilarityBackend::add`], with its embedding when
/// the backend needs one.
#[derive(Debug, Clone)]
pub struct IndexInput {
    pub passage: Arc<Passage>,
    pub vector: Option<Vec<f32>>,
}

/// Query as seen by a backend: raw text, plus an embedding for dense search.
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
    pub text: &'a str,
    pub vector: Option<&'a [f32]>,
}

/// Raw similarity of one passage to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub passage_id: PassageId,
    pub raw_score: f64,
}

/// Similarity backend contract shared by the lexical and dense indexes.
pub trait SimilarityBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether [`IndexInput::vector`] and [`SearchQuery::vector`] must be set.
    fn needs_embeddings(&self) -> bool {
        self.kind() == BackendKind::Dense
    }

    /// Add passages. All-or-nothing: on error nothing is added.
    fn add(&mut self, batch: Vec<IndexInput>) -> Result<()>;

    /// Remove every passage of `document_id`, returning how many were removed.
    fn remove_document(&mut self, document_id: &str) -> Result<usize>;

    /// Score passages against `query`, best first.
    ///
    /// With `candidates`, only those passage ids are scored. An empty index
    /// yields an empty list.
    fn search(
        &self,
        query: &SearchQuery<'_>,
        candidates: Option<&HashSet<PassageId>>,
    ) -> Result<Vec<ScoredPassage>>;

    fn clear(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Create the backend selected by configuration.
///
/// `dims` is the embedding width for the dense backend and ignored for
/// the lexical one.
pub fn create_backend(
    kind: BackendKind,
    lexical: &LexicalConfig,
    dims: usize,
) -> Box<dyn SimilarityBackend> {
    match kind {
        BackendKind::Lexical => Box::new(LexicalBackend::new(lexical.clone())),
        BackendKind::Dense => Box::new(DenseBackend::new(dims)),
    }
}

/// Order scored passages best first, breaking ties by passage id.
pub(crate) fn sort_scored(scored: &mut [ScoredPassage]) {
    scored.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.passage_id.cmp(&b.passage_id))
    });
}

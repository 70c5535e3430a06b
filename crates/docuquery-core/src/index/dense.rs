//! Dense embedding backend.
//!
//! Stores one unit-length vector per passage and answers queries by
//! brute-force cosine similarity. Inserts and deletes touch only the
//! affected entries; there is no global rebuild.

use std::collections::{BTreeMap, HashSet};

use crate::config::BackendKind;
use crate::embedding::{cosine_similarity, normalize};
use crate::error::{CoreError, Result};
use crate::index::{sort_scored, IndexInput, ScoredPassage, SearchQuery, SimilarityBackend};
use crate::models::PassageId;

pub struct DenseBackend {
    dims: usize,
    entries: BTreeMap<PassageId, Vec<f32>>,
}

impl DenseBackend {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            entries: BTreeMap::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    fn check_dims(&self, what: &str, len: usize) -> Result<()> {
        if len != self.dims {
            return Err(CoreError::IndexBuild(format!(
                "{} has {} dimensions, index expects {}",
                what, len, self.dims
            )));
        }
        Ok(())
    }
}

impl SimilarityBackend for DenseBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dense
    }

    fn add(&mut self, batch: Vec<IndexInput>) -> Result<()> {
        // Validate the whole batch before touching the live entries.
        let mut staged = Vec::with_capacity(batch.len());
        for input in batch {
            let mut vector = input.vector.ok_or_else(|| {
                CoreError::IndexBuild(format!("passage {} has no embedding", input.passage.id))
            })?;
            self.check_dims(&format!("embedding for {}", input.passage.id), vector.len())?;
            normalize(&mut vector);
            staged.push((input.passage.id.clone(), vector));
        }
        self.entries.extend(staged);
        Ok(())
    }

    fn remove_document(&mut self, document_id: &str) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|id, _| id.document_id != document_id);
        Ok(before - self.entries.len())
    }

    fn search(
        &self,
        query: &SearchQuery<'_>,
        candidates: Option<&HashSet<PassageId>>,
    ) -> Result<Vec<ScoredPassage>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let qv = query.vector.ok_or_else(|| {
            CoreError::InvalidQuery("dense search requires a query embedding".to_string())
        })?;
        self.check_dims("query embedding", qv.len())?;

        let mut scored: Vec<ScoredPassage> = self
            .entries
            .iter()
            .filter(|(id, _)| candidates.map_or(true, |c| c.contains(*id)))
            .map(|(id, v)| ScoredPassage {
                passage_id: id.clone(),
                raw_score: cosine_similarity(qv, v) as f64,
            })
            .collect();
        sort_scored(&mut scored);
        Ok(scored)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

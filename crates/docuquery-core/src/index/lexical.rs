//! TF-IDF lexical backend.
//!
//! Weighting follows the smoothed scheme:
//!
//! ```text
//! idf(t)    = ln((1 + n) / (1 + df(t))) + 1
//! w(t, p)   = tf(t, p) × idf(t)
//! vector(p) = w(·, p) / ‖w(·, p)‖₂
//! score     = vector(query) · vector(p)     (cosine, in [0, 1])
//! ```
//!
//! Every add or remove rebuilds the vocabulary, the IDF table, and every
//! passage vector from scratch. The new [`VectorSpace`] is assembled
//! separately and swapped in only when complete.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::config::{BackendKind, LexicalConfig};
use crate::error::{CoreError, Result};
use crate::index::{sort_scored, IndexInput, ScoredPassage, SearchQuery, SimilarityBackend};
use crate::models::{Passage, PassageId};
use crate::text::{is_stop_word, tokenize};

/// Sparse vector as `(term index, weight)` pairs sorted by term index.
type SparseVector = Vec<(usize, f64)>;

/// One generation of the TF-IDF space.
#[derive(Debug, Default)]
struct VectorSpace {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    rows: HashMap<PassageId, SparseVector>,
}

impl VectorSpace {
    fn build(passages: &BTreeMap<PassageId, Arc<Passage>>, config: &LexicalConfig) -> Result<Self> {
        let n = passages.len();
        let mut term_counts: Vec<(&PassageId, BTreeMap<String, u32>)> = Vec::new();
        term_counts
            .try_reserve_exact(n)
            .map_err(|e| CoreError::IndexBuild(e.to_string()))?;

        let mut terms: BTreeSet<String> = BTreeSet::new();
        for (id, passage) in passages {
            let mut counts: BTreeMap<String, u32> = BTreeMap::new();
            for tok in analyze(&passage.text, config) {
                *counts.entry(tok).or_insert(0) += 1;
            }
            terms.extend(counts.keys().cloned());
            term_counts.push((id, counts));
        }

        // Sorted vocabulary keeps term indices independent of insertion order.
        let vocabulary: HashMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t, i))
            .collect();

        let mut df = vec![0usize; vocabulary.len()];
        for (_, counts) in &term_counts {
            for term in counts.keys() {
                df[vocabulary[term]] += 1;
            }
        }
        let idf: Vec<f64> = df
            .iter()
            .map(|&d| ((1.0 + n as f64) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let mut rows: HashMap<PassageId, SparseVector> = HashMap::new();
        rows.try_reserve(n)
            .map_err(|e| CoreError::IndexBuild(e.to_string()))?;
        for (id, counts) in term_counts {
            let mut row: SparseVector = counts
                .iter()
                .map(|(term, &tf)| {
                    let idx = vocabulary[term];
                    (idx, tf as f64 * idf[idx])
                })
                .collect();
            row.sort_by_key(|(idx, _)| *idx);
            l2_normalize(&mut row);
            rows.insert(id.clone(), row);
        }

        Ok(Self {
            vocabulary,
            idf,
            rows,
        })
    }

    /// Project query text into this space. Unknown terms are dropped.
    fn project(&self, text: &str, config: &LexicalConfig) -> SparseVector {
        let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
        for tok in analyze(text, config) {
            if let Some(&idx) = self.vocabulary.get(&tok) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }
        let mut v: SparseVector = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf as f64 * self.idf[idx]))
            .collect();
        l2_normalize(&mut v);
        v
    }
}

fn analyze(text: &str, config: &LexicalConfig) -> Vec<String> {
    let mut tokens = tokenize(text, config.min_token_len);
    if config.stop_words {
        tokens.retain(|t| !is_stop_word(t));
    }
    tokens
}

fn l2_normalize(v: &mut SparseVector) {
    let norm = v.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, w) in v.iter_mut() {
            *w /= norm;
        }
    }
}

/// Dot product of two index-sorted sparse vectors.
fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// TF-IDF backend with a full rebuild per mutation.
pub struct LexicalBackend {
    config: LexicalConfig,
    passages: BTreeMap<PassageId, Arc<Passage>>,
    space: VectorSpace,
    generation: u64,
}

impl LexicalBackend {
    pub fn new(config: LexicalConfig) -> Self {
        Self {
            config,
            passages: BTreeMap::new(),
            space: VectorSpace::default(),
            generation: 0,
        }
    }

    /// Number of completed rebuilds. Failed rebuilds do not count.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn vocabulary_len(&self) -> usize {
        self.space.vocabulary.len()
    }

    fn rebuild_with(&mut self, next: BTreeMap<PassageId, Arc<Passage>>) -> Result<()> {
        let space = VectorSpace::build(&next, &self.config)?;
        self.passages = next;
        self.space = space;
        self.generation += 1;
        tracing::debug!(
            generation = self.generation,
            passages = self.passages.len(),
            vocabulary = self.space.vocabulary.len(),
            "rebuilt tf-idf space"
        );
        Ok(())
    }
}

impl SimilarityBackend for LexicalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Lexical
    }

    fn add(&mut self, batch: Vec<IndexInput>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut next = self.passages.clone();
        for input in batch {
            next.insert(input.passage.id.clone(), input.passage);
        }
        self.rebuild_with(next)
    }

    fn remove_document(&mut self, document_id: &str) -> Result<usize> {
        let mut next = self.passages.clone();
        next.retain(|id, _| id.document_id != document_id);
        let removed = self.passages.len() - next.len();
        if removed > 0 {
            self.rebuild_with(next)?;
        }
        Ok(removed)
    }

    fn search(
        &self,
        query: &SearchQuery<'_>,
        candidates: Option<&HashSet<PassageId>>,
    ) -> Result<Vec<ScoredPassage>> {
        let q = self.space.project(query.text, &self.config);
        let mut scored: Vec<ScoredPassage> = self
            .passages
            .keys()
            .filter(|id| candidates.map_or(true, |c| c.contains(*id)))
            .map(|id| {
                let raw_score = match self.space.rows.get(id) {
                    Some(row) if !q.is_empty() => sparse_dot(&q, row),
                    _ => 0.0,
                };
                ScoredPassage {
                    passage_id: id.clone(),
                    raw_score,
                }
            })
            .collect();
        sort_scored(&mut scored);
        Ok(scored)
    }

    fn clear(&mut self) {
        self.passages.clear();
        self.space = VectorSpace::default();
        self.generation += 1;
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}

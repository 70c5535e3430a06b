//! Corpus manager: document lifecycle and query orchestration.
//!
//! The manager owns the only mutable copy of the corpus (documents,
//! passages, and the similarity index) behind a single reader/writer lock:
//!
//! - `ingest`, `delete`, and `clear` take the write lock, so a lexical
//!   rebuild is never observed half-done.
//! - `extract_passages` and the retrieval half of `query` take the read
//!   lock and may run concurrently with each other.
//! - Embedding and completion calls happen outside the lock. The answer
//!   composer only runs after the read guard is released.
//!
//! Every mutation prepares its result first and commits by swapping state,
//! so a failed ingest or delete leaves the corpus exactly as it was.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::compose::AnswerComposer;
use crate::config::{BackendKind, EngineConfig};
use crate::embedding::{embed_one, EmbeddingProvider};
use crate::error::{CoreError, Result};
use crate::index::{create_backend, IndexInput, SearchQuery, SimilarityBackend};
use crate::models::{
    Answer, Document, DocumentSummary, DocumentView, NewDocument, Passage, PassageId,
    RankedPassage, SourceKind,
};
use crate::rank::{PassageSource, Ranker};
use crate::text::{char_len, normalize_text};

/// Title used for direct text input when the caller gives none.
pub const DEFAULT_TEXT_TITLE: &str = "Direct Text Input";

struct CorpusState {
    documents: BTreeMap<String, Document>,
    passages: HashMap<PassageId, Arc<Passage>>,
    index: Box<dyn SimilarityBackend>,
}

impl PassageSource for CorpusState {
    fn passage(&self, id: &PassageId) -> Option<&Passage> {
        self.passages.get(id).map(|p| p.as_ref())
    }

    fn document_title(&self, document_id: &str) -> Option<&str> {
        self.documents.get(document_id).map(|d| d.title.as_str())
    }
}

impl CorpusState {
    /// Passage ids of the filtered documents, or `None` for the whole corpus.
    fn candidates(&self, document_ids: Option<&[String]>) -> Result<Option<HashSet<PassageId>>> {
        let ids = match document_ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => return Ok(None),
        };
        let unknown: Vec<String> = ids
            .iter()
            .filter(|id| !self.documents.contains_key(id.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(CoreError::InvalidFilter(unknown));
        }
        Ok(Some(
            ids.iter()
                .filter_map(|id| self.documents.get(id.as_str()))
                .flat_map(|doc| doc.passage_ids.iter().cloned())
                .collect(),
        ))
    }
}

/// Counts reported by [`CorpusManager::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub documents: usize,
    pub passages: usize,
    pub backend: BackendKind,
}

pub struct CorpusManager {
    config: EngineConfig,
    state: RwLock<CorpusState>,
    ranker: Ranker,
    composer: AnswerComposer,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl CorpusManager {
    /// Lexical backend with extractive answers.
    pub fn lexical(config: EngineConfig) -> Result<Self> {
        let config = EngineConfig {
            backend: BackendKind::Lexical,
            ..config
        };
        let composer = AnswerComposer::extractive(&config.answer, config.ranking.thresholds);
        Self::new(config, None, composer)
    }

    /// Build a manager. The dense backend requires an `embedder`.
    pub fn new(
        config: EngineConfig,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        composer: AnswerComposer,
    ) -> Result<Self> {
        config.validate()?;
        let dims = match (config.backend, &embedder) {
            (BackendKind::Dense, None) => {
                return Err(CoreError::Configuration(
                    "dense backend requires an embedding provider".to_string(),
                ))
            }
            (BackendKind::Dense, Some(e)) if e.dims() == 0 => {
                return Err(CoreError::Configuration(format!(
                    "embedding provider '{}' reports zero dimensions",
                    e.model_name()
                )))
            }
            (_, Some(e)) => e.dims(),
            (_, None) => 0,
        };
        let index = create_backend(config.backend, &config.lexical, dims);
        Ok(Self {
            ranker: Ranker::new(config.ranking.clone()),
            state: RwLock::new(CorpusState {
                documents: BTreeMap::new(),
                passages: HashMap::new(),
                index,
            }),
            config,
            composer,
            embedder,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn composer(&self) -> &AnswerComposer {
        &self.composer
    }

    fn read(&self) -> RwLockReadGuard<'_, CorpusState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CorpusState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn dense_embedder(&self) -> Option<&Arc<dyn EmbeddingProvider>> {
        match self.config.backend {
            BackendKind::Dense => self.embedder.as_ref(),
            BackendKind::Lexical => None,
        }
    }

    /// Chunk and index a document. Returns the new document id.
    pub async fn ingest(&self, doc: NewDocument) -> Result<String> {
        let text = normalize_text(&doc.text);
        if text.trim().is_empty() {
            return Err(CoreError::EmptyDocument);
        }

        let id = Uuid::new_v4().to_string();
        let passages = chunk_text(&id, &text, &self.config.chunking);

        let vectors = match self.dense_embedder() {
            Some(embedder) => {
                let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
                let vectors = embedder.embed(&texts).await.map_err(CoreError::Embedding)?;
                if vectors.len() != passages.len() {
                    return Err(CoreError::IndexBuild(format!(
                        "embedding provider returned {} vectors for {} passages",
                        vectors.len(),
                        passages.len()
                    )));
                }
                vectors.into_iter().map(Some).collect()
            }
            None => vec![None; passages.len()],
        };

        let passages: Vec<Arc<Passage>> = passages.into_iter().map(Arc::new).collect();
        let inputs: Vec<IndexInput> = passages
            .iter()
            .zip(vectors)
            .map(|(p, vector)| IndexInput {
                passage: Arc::clone(p),
                vector,
            })
            .collect();

        let document = Document {
            id: id.clone(),
            title: doc.title,
            kind: doc.kind,
            created_at: Utc::now(),
            passage_ids: passages.iter().map(|p| p.id.clone()).collect(),
            text,
        };

        {
            let mut state = self.write();
            state.index.add(inputs)?;
            for p in passages {
                state.passages.insert(p.id.clone(), p);
            }
            tracing::info!(
                document = %id,
                title = %document.title,
                kind = %document.kind,
                passages = document.passage_ids.len(),
                "ingested document"
            );
            state.documents.insert(id.clone(), document);
        }
        Ok(id)
    }

    /// Ingest pasted text. An empty title becomes [`DEFAULT_TEXT_TITLE`].
    pub async fn ingest_text(&self, text: &str, title: Option<&str>) -> Result<String> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TEXT_TITLE);
        self.ingest(NewDocument {
            title: title.to_string(),
            kind: SourceKind::DirectInput,
            text: text.to_string(),
        })
        .await
    }

    /// Ingest text already extracted from an uploaded file.
    pub async fn ingest_file_text(
        &self,
        extracted_text: &str,
        title: &str,
        kind: SourceKind,
    ) -> Result<String> {
        self.ingest(NewDocument {
            title: title.to_string(),
            kind,
            text: extracted_text.to_string(),
        })
        .await
    }

    /// Remove a document, its passages, and their index entries.
    pub fn delete(&self, document_id: &str) -> Result<()> {
        let mut state = self.write();
        let passage_ids = match state.documents.get(document_id) {
            Some(doc) => doc.passage_ids.clone(),
            None => return Err(CoreError::NotFound(document_id.to_string())),
        };
        state.index.remove_document(document_id)?;
        for id in &passage_ids {
            state.passages.remove(id);
        }
        state.documents.remove(document_id);
        tracing::info!(document = %document_id, passages = passage_ids.len(), "deleted document");
        Ok(())
    }

    /// Remove everything. Returns the number of documents removed.
    pub fn clear(&self) -> usize {
        let mut state = self.write();
        let count = state.documents.len();
        state.index.clear();
        state.passages.clear();
        state.documents.clear();
        tracing::info!(documents = count, "cleared corpus");
        count
    }

    /// Summaries ordered by creation time, then id.
    pub fn list_documents(&self) -> Vec<DocumentSummary> {
        let state = self.read();
        let mut docs: Vec<&Document> = state.documents.values().collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        docs.into_iter()
            .map(|d| DocumentSummary {
                id: d.id.clone(),
                title: d.title.clone(),
                kind: d.kind,
                char_count: char_len(&d.text),
                passage_count: d.passage_ids.len(),
                created_at: d.created_at.to_rfc3339(),
            })
            .collect()
    }

    /// A document and its passages in sequence order.
    pub fn document(&self, document_id: &str) -> Result<DocumentView> {
        let state = self.read();
        let document = state
            .documents
            .get(document_id)
            .ok_or_else(|| CoreError::NotFound(document_id.to_string()))?;
        let passages = document
            .passage_ids
            .iter()
            .filter_map(|id| state.passages.get(id).map(|p| p.as_ref().clone()))
            .collect();
        Ok(DocumentView {
            document: document.clone(),
            passages,
        })
    }

    pub fn stats(&self) -> CorpusStats {
        let state = self.read();
        CorpusStats {
            documents: state.documents.len(),
            passages: state.index.len(),
            backend: state.index.kind(),
        }
    }

    fn validate_query(&self, text: &str, top_k: Option<usize>) -> Result<usize> {
        if text.trim().is_empty() {
            return Err(CoreError::InvalidQuery("query must not be empty".to_string()));
        }
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        if top_k == 0 || top_k > self.config.max_top_k {
            return Err(CoreError::InvalidQuery(format!(
                "top_k must be in 1..={}",
                self.config.max_top_k
            )));
        }
        Ok(top_k)
    }

    /// Ranked passages for `text` without answer composition.
    ///
    /// An empty corpus yields an empty list. A non-empty `document_ids`
    /// restricts the search to those documents and must only name
    /// existing ones.
    pub async fn extract_passages(
        &self,
        text: &str,
        top_k: Option<usize>,
        document_ids: Option<&[String]>,
    ) -> Result<Vec<RankedPassage>> {
        let top_k = self.validate_query(text, top_k)?;

        {
            let state = self.read();
            state.candidates(document_ids)?;
            if state.index.is_empty() {
                return Ok(Vec::new());
            }
        }

        let query_vector = match self.dense_embedder() {
            Some(embedder) => Some(
                embed_one(embedder.as_ref(), text)
                    .await
                    .map_err(CoreError::Embedding)?,
            ),
            None => None,
        };

        let state = self.read();
        let candidates = state.candidates(document_ids)?;
        let raw = state.index.search(
            &SearchQuery {
                text,
                vector: query_vector.as_deref(),
            },
            candidates.as_ref(),
        )?;
        Ok(self
            .ranker
            .rank(&raw, &*state, text, top_k, self.config.min_score))
    }

    /// Answer `text` from the corpus.
    ///
    /// Fails with [`CoreError::NoRelevantContent`] when retrieval returns
    /// nothing (empty corpus, or everything filtered out).
    pub async fn query(
        &self,
        text: &str,
        top_k: Option<usize>,
        document_ids: Option<&[String]>,
    ) -> Result<Answer> {
        let ranked = self.extract_passages(text, top_k, document_ids).await?;
        self.composer.compose(text.trim(), ranked).await
    }
}

//! Ranking, confidence bucketing, and query-term highlighting.
//!
//! [`Ranker::rank`] turns raw backend scores into [`RankedPassage`]s:
//!
//! 1. Drop candidates below `min_score` (when set).
//! 2. Sort by score (desc), passage sequence (asc), document id (asc).
//! 3. Truncate to `top_k`.
//! 4. Label each item with its [`Confidence`] bucket.
//! 5. Attach highlight spans for query terms found in the passage text.
//!
//! Highlights are computed lexically for both backends. With the dense
//! backend they are best-effort: a passage can be semantically close to
//! the query without sharing any of its words.

use crate::config::RankingConfig;
use crate::index::ScoredPassage;
use crate::models::{Passage, PassageId, RankedPassage, Span};
use crate::text::{fold_char, is_stop_word, tokenize};

/// Read access to passage text and document titles during ranking.
pub trait PassageSource {
    fn passage(&self, id: &PassageId) -> Option<&Passage>;
    fn document_title(&self, document_id: &str) -> Option<&str>;
}

#[derive(Debug, Clone)]
pub struct Ranker {
    config: RankingConfig,
}

impl Ranker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn rank<S: PassageSource + ?Sized>(
        &self,
        raw: &[ScoredPassage],
        source: &S,
        query: &str,
        top_k: usize,
        min_score: Option<f64>,
    ) -> Vec<RankedPassage> {
        let mut ordered: Vec<&ScoredPassage> = raw
            .iter()
            .filter(|s| min_score.map_or(true, |min| s.raw_score >= min))
            .collect();
        ordered.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.passage_id.sequence.cmp(&b.passage_id.sequence))
                .then_with(|| a.passage_id.document_id.cmp(&b.passage_id.document_id))
        });

        let terms = if self.config.highlights {
            self.highlight_terms(query)
        } else {
            Vec::new()
        };

        let mut ranked = Vec::with_capacity(top_k.min(ordered.len()));
        for scored in ordered {
            if ranked.len() == top_k {
                break;
            }
            let Some(passage) = source.passage(&scored.passage_id) else {
                tracing::warn!(passage = %scored.passage_id, "scored passage missing from corpus");
                continue;
            };
            let title = source
                .document_title(passage.document_id())
                .unwrap_or_default()
                .to_string();
            ranked.push(RankedPassage {
                passage_id: passage.id.clone(),
                document_title: title,
                start: passage.start,
                end: passage.end,
                score: scored.raw_score,
                confidence: self.config.thresholds.bucket(scored.raw_score),
                highlights: find_spans(&passage.text, &terms),
                text: passage.text.clone(),
            });
        }
        tracing::debug!(candidates = raw.len(), returned = ranked.len(), "ranked passages");
        ranked
    }

    /// Query terms eligible for highlighting, lowercased and deduplicated.
    pub fn highlight_terms(&self, query: &str) -> Vec<String> {
        let mut terms: Vec<String> = tokenize(query, self.config.highlight_min_term_len.max(1))
            .into_iter()
            .filter(|t| !(self.config.exclude_stop_words && is_stop_word(t)))
            .collect();
        terms.sort();
        terms.dedup();
        terms
    }

    /// Highlight spans of `query`'s terms inside `text`.
    pub fn highlights(&self, text: &str, query: &str) -> Vec<Span> {
        find_spans(text, &self.highlight_terms(query))
    }
}

/// Case-insensitive occurrences of `terms` in `text`, merged where they
/// overlap or touch. Offsets are char positions.
pub fn find_spans(text: &str, terms: &[String]) -> Vec<Span> {
    if terms.is_empty() {
        return Vec::new();
    }
    let hay: Vec<char> = text.chars().map(fold_char).collect();
    let mut spans = Vec::new();
    for term in terms {
        let needle: Vec<char> = term.chars().collect();
        if needle.is_empty() || needle.len() > hay.len() {
            continue;
        }
        for start in 0..=hay.len() - needle.len() {
            if hay[start..start + needle.len()] == needle[..] {
                spans.push(Span {
                    start,
                    end: start + needle.len(),
                });
            }
        }
    }
    merge_spans(spans)
}

fn merge_spans(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by_key(|s| (s.start, s.end));
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for s in spans {
        match merged.last_mut() {
            Some(last) if s.start <= last.end => last.end = last.end.max(s.end),
            _ => merged.push(s),
        }
    }
    merged
}

//! Answer composition.
//!
//! An [`AnswerComposer`] wraps one [`AnswerStrategy`]:
//!
//! - **Extractive**: joins the ranked passage texts. No external call.
//! - **Generative**: builds a bounded prompt with citation markers and
//!   asks a [`CompletionProvider`] to write the answer.
//!
//! Both strategies report [`CoreError::NoRelevantContent`] for an empty
//! ranking. When the generative call fails, the composer's
//! [`FallbackPolicy`] decides between an extractive answer (with
//! `fallback_reason` set) and [`CoreError::CompositionUnavailable`].
//!
//! Aggregate confidence is the top-ranked passage's raw score clamped to
//! `[0, 1]`, labelled with the same thresholds the ranker uses. It does not
//! depend on which strategy wrote the text.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::completion::{CompletionOptions, CompletionProvider};
use crate::config::{AnswerConfig, ConfidenceThresholds, FallbackPolicy};
use crate::error::{CoreError, ProviderError, Result};
use crate::models::{Answer, RankedPassage, StrategyKind};
use crate::text::{char_len, truncate_on_word};

/// Answer text used when every ranked passage scored zero.
pub const NO_MATCH_TEXT: &str =
    "No passage matched the query terms; the closest passages are listed as sources.";

const PROMPT_HEADER: &str = "You are a helpful assistant that answers questions based on the provided context.\n\
\n\
Instructions:\n\
- Answer the question using ONLY the information from the context below\n\
- If the context doesn't contain enough information, say so clearly\n\
- Be concise and direct in your response\n\
- Cite the sources you use with their [n] markers\n\
\n\
Context:\n";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Drop repeated passage ids, keeping the first (best-ranked) occurrence.
fn dedup(items: &[RankedPassage]) -> Vec<&RankedPassage> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|r| seen.insert(r.passage_id.clone()))
        .collect()
}

fn aggregate_confidence(items: &[RankedPassage]) -> f64 {
    items
        .first()
        .map(|r| r.score.clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

#[derive(Debug, Clone)]
pub struct ExtractiveComposer {
    max_answer_chars: usize,
}

impl ExtractiveComposer {
    pub fn new(max_answer_chars: usize) -> Self {
        Self { max_answer_chars }
    }

    /// Answer body: positive-score passage texts, trimmed and separated by
    /// blank lines, cut at `max_answer_chars` on a word boundary.
    pub fn compose_text(&self, items: &[RankedPassage]) -> Result<String> {
        if items.is_empty() {
            return Err(CoreError::NoRelevantContent);
        }
        let texts: Vec<&str> = dedup(items)
            .into_iter()
            .filter(|r| r.score > 0.0)
            .map(|r| r.text.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            return Ok(NO_MATCH_TEXT.to_string());
        }
        Ok(truncate_on_word(&texts.join("\n\n"), self.max_answer_chars))
    }
}

#[derive(Clone)]
pub struct GenerativeComposer {
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
    max_prompt_chars: usize,
    timeout: Duration,
}

impl GenerativeComposer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        options: CompletionOptions,
        max_prompt_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            options,
            max_prompt_chars,
            timeout,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Build a prompt of at most `max_prompt_chars` characters.
    ///
    /// Passages are added in rank order as `[Source n: title]` blocks until
    /// the budget runs out; the last block that does not fit is cut short.
    pub fn build_prompt(&self, query: &str, items: &[RankedPassage]) -> String {
        let budget = self.max_prompt_chars;
        let mut footer = format!("\n\nQuestion: {}\n\nAnswer:", query.trim());
        let fixed = char_len(PROMPT_HEADER) + char_len(&footer);
        if fixed > budget {
            // Not even the question fits: keep as much of it as possible.
            let room = budget.saturating_sub(char_len(PROMPT_HEADER) + char_len("\n\nQuestion: \n\nAnswer:"));
            let q: String = query.trim().chars().take(room).collect();
            footer = format!("\n\nQuestion: {}\n\nAnswer:", q);
            let mut prompt = format!("{}{}", PROMPT_HEADER, footer);
            if char_len(&prompt) > budget {
                prompt = prompt.chars().take(budget).collect();
            }
            return prompt;
        }

        let mut remaining = budget - fixed;
        let mut context = String::new();
        for (n, item) in dedup(items).into_iter().enumerate() {
            let sep = if n == 0 { "" } else { CONTEXT_SEPARATOR };
            let head = format!(
                "{}[Source {}: {} (passage {})]\n",
                sep,
                n + 1,
                item.document_title,
                item.passage_id.sequence
            );
            let head_len = char_len(&head);
            if head_len >= remaining {
                break;
            }
            let body = item.text.trim();
            let body_len = char_len(body);
            if head_len + body_len <= remaining {
                context.push_str(&head);
                context.push_str(body);
                remaining -= head_len + body_len;
            } else {
                let room = remaining - head_len;
                context.push_str(&head);
                context.extend(body.chars().take(room));
                break;
            }
        }
        format!("{}{}{}", PROMPT_HEADER, context, footer)
    }

    /// Ask the provider for an answer body, bounded by the configured timeout.
    pub async fn compose_text(
        &self,
        query: &str,
        items: &[RankedPassage],
    ) -> Result<String> {
        if items.is_empty() {
            return Err(CoreError::NoRelevantContent);
        }
        let prompt = self.build_prompt(query, items);
        let call = self.provider.complete(&prompt, &self.options);
        let text = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
            Ok(result) => result,
        }
        .map_err(CoreError::CompositionUnavailable)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::CompositionUnavailable(ProviderError::Unavailable(
                format!("{} returned an empty completion", self.provider.name()),
            )));
        }
        Ok(text.to_string())
    }
}

/// The active answer strategy.
#[derive(Clone)]
pub enum AnswerStrategy {
    Extractive(ExtractiveComposer),
    Generative(GenerativeComposer),
}

impl AnswerStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            AnswerStrategy::Extractive(_) => StrategyKind::Extractive,
            AnswerStrategy::Generative(_) => StrategyKind::Generative,
        }
    }
}

#[derive(Clone)]
pub struct AnswerComposer {
    strategy: AnswerStrategy,
    extractive: ExtractiveComposer,
    fallback: FallbackPolicy,
    thresholds: ConfidenceThresholds,
}

impl AnswerComposer {
    /// Extractive-only composer.
    pub fn extractive(config: &AnswerConfig, thresholds: ConfidenceThresholds) -> Self {
        let extractive = ExtractiveComposer::new(config.max_answer_chars);
        Self {
            strategy: AnswerStrategy::Extractive(extractive.clone()),
            extractive,
            fallback: config.fallback,
            thresholds,
        }
    }

    /// Generative composer backed by `provider`.
    pub fn generative(
        config: &AnswerConfig,
        thresholds: ConfidenceThresholds,
        provider: Arc<dyn CompletionProvider>,
        options: CompletionOptions,
    ) -> Self {
        let generative = GenerativeComposer::new(
            provider,
            options,
            config.max_prompt_chars,
            config.completion_timeout,
        );
        Self {
            strategy: AnswerStrategy::Generative(generative),
            extractive: ExtractiveComposer::new(config.max_answer_chars),
            fallback: config.fallback,
            thresholds,
        }
    }

    pub fn strategy(&self) -> &AnswerStrategy {
        &self.strategy
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    pub async fn compose(&self, query: &str, items: Vec<RankedPassage>) -> Result<Answer> {
        if items.is_empty() {
            return Err(CoreError::NoRelevantContent);
        }
        let (text, strategy, fallback_reason) = match &self.strategy {
            AnswerStrategy::Extractive(ex) => (ex.compose_text(&items)?, StrategyKind::Extractive, None),
            AnswerStrategy::Generative(generative) => match generative.compose_text(query, &items).await {
                Ok(text) => (text, StrategyKind::Generative, None),
                Err(err @ CoreError::CompositionUnavailable(_)) => match self.fallback {
                    FallbackPolicy::Fail => return Err(err),
                    FallbackPolicy::Extractive => {
                        tracing::warn!(
                            provider = generative.provider_name(),
                            error = %err,
                            "generative answer failed, falling back to extractive"
                        );
                        (
                            self.extractive.compose_text(&items)?,
                            StrategyKind::Extractive,
                            Some(err.to_string()),
                        )
                    }
                },
                Err(err) => return Err(err),
            },
        };

        let confidence = aggregate_confidence(&items);
        Ok(Answer {
            query: query.to_string(),
            text,
            confidence,
            confidence_label: self.thresholds.bucket(confidence),
            sources: dedup(&items).into_iter().cloned().collect(),
            strategy,
            fallback_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, PassageId};
    use async_trait::async_trait;

    fn item(doc: &str, seq: usize, score: f64, text: &str) -> RankedPassage {
        RankedPassage {
            passage_id: PassageId::new(doc, seq),
            document_title: format!("Title {}", doc),
            start: 0,
            end: text.chars().count(),
            score,
            confidence: ConfidenceThresholds::default().bucket(score),
            highlights: Vec::new(),
            text: text.to_string(),
        }
    }

    struct Echo;

    #[async_trait]
    impl CompletionProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> std::result::Result<String, ProviderError> {
            Ok(format!("chars={}", prompt.chars().count()))
        }
    }

    struct Down;

    #[async_trait]
    impl CompletionProvider for Down {
        fn name(&self) -> &str {
            "down"
        }
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> std::result::Result<String, ProviderError> {
            Err(ProviderError::Unavailable("connection refused".to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl CompletionProvider for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> std::result::Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    fn generative(provider: Arc<dyn CompletionProvider>, fallback: FallbackPolicy) -> AnswerComposer {
        let config = AnswerConfig {
            fallback,
            completion_timeout: Duration::from_millis(50),
            ..AnswerConfig::default()
        };
        AnswerComposer::generative(
            &config,
            ConfidenceThresholds::default(),
            provider,
            CompletionOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_extractive_joins_and_dedups() {
        let composer = AnswerComposer::extractive(&AnswerConfig::default(), ConfidenceThresholds::default());
        let items = vec![
            item("a", 0, 0.7, " first passage "),
            item("a", 0, 0.7, " first passage "),
            item("b", 1, 0.3, "second passage"),
        ];
        let answer = composer.compose("q", items).await.unwrap();
        assert_eq!(answer.text, "first passage\n\nsecond passage");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.confidence, 0.7);
        assert_eq!(answer.confidence_label, Confidence::High);
        assert_eq!(answer.strategy, StrategyKind::Extractive);
        assert!(answer.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn test_empty_ranking_is_no_relevant_content() {
        let composer = AnswerComposer::extractive(&AnswerConfig::default(), ConfidenceThresholds::default());
        let err = composer.compose("q", Vec::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::NoRelevantContent));
        let err = generative(Arc::new(Echo), FallbackPolicy::Fail)
            .compose("q", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoRelevantContent));
    }

    #[tokio::test]
    async fn test_zero_scores_still_answer_with_low_confidence() {
        let composer = AnswerComposer::extractive(&AnswerConfig::default(), ConfidenceThresholds::default());
        let answer = composer.compose("q", vec![item("a", 0, 0.0, "text")]).await.unwrap();
        assert_eq!(answer.text, NO_MATCH_TEXT);
        assert_eq!(answer.confidence_label, Confidence::Low);
        assert_eq!(answer.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_extractive_truncates_long_answers() {
        let config = AnswerConfig {
            max_answer_chars: 20,
            ..AnswerConfig::default()
        };
        let composer = AnswerComposer::extractive(&config, ConfidenceThresholds::default());
        let answer = composer
            .compose("q", vec![item("a", 0, 0.9, "alpha beta gamma delta epsilon zeta")])
            .await
            .unwrap();
        assert_eq!(answer.text, "alpha beta gamma...");
    }

    #[tokio::test]
    async fn test_generative_uses_provider_text() {
        let composer = generative(Arc::new(Echo), FallbackPolicy::Fail);
        let answer = composer
            .compose("what?", vec![item("a", 0, 0.4, "context")])
            .await
            .unwrap();
        assert!(answer.text.starts_with("chars="));
        assert_eq!(answer.strategy, StrategyKind::Generative);
        assert_eq!(answer.sources[0].passage_id, PassageId::new("a", 0));
        assert_eq!(answer.confidence_label, Confidence::Medium);
    }

    #[tokio::test]
    async fn test_provider_error_fails_without_fallback() {
        let composer = generative(Arc::new(Down), FallbackPolicy::Fail);
        let err = composer
            .compose("q", vec![item("a", 0, 0.4, "context")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::CompositionUnavailable(ProviderError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_falls_back_when_configured() {
        let composer = generative(Arc::new(Slow), FallbackPolicy::Extractive);
        let answer = composer
            .compose("q", vec![item("a", 0, 0.4, "context text")])
            .await
            .unwrap();
        assert_eq!(answer.strategy, StrategyKind::Extractive);
        assert_eq!(answer.text, "context text");
        assert!(answer.fallback_reason.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_timeout_without_fallback() {
        let composer = generative(Arc::new(Slow), FallbackPolicy::Fail);
        let err = composer
            .compose("q", vec![item("a", 0, 0.4, "context")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::CompositionUnavailable(ProviderError::Timeout(_))
        ));
    }

    #[test]
    fn test_prompt_has_citations_and_question() {
        let composer = GenerativeComposer::new(
            Arc::new(Echo),
            CompletionOptions::default(),
            10_000,
            Duration::from_secs(1),
        );
        let prompt = composer.build_prompt(
            "How do I deploy?",
            &[item("a", 2, 0.9, "Use kubectl."), item("b", 0, 0.5, "Use helm.")],
        );
        assert!(prompt.contains("[Source 1: Title a (passage 2)]\nUse kubectl."));
        assert!(prompt.contains("---\n\n[Source 2: Title b (passage 0)]\nUse helm."));
        assert!(prompt.ends_with("Question: How do I deploy?\n\nAnswer:"));
    }

    #[test]
    fn test_prompt_respects_budget() {
        let long = "word ".repeat(2000);
        for budget in [50usize, 700, 1500, 5000] {
            let composer = GenerativeComposer::new(
                Arc::new(Echo),
                CompletionOptions::default(),
                budget,
                Duration::from_secs(1),
            );
            let prompt = composer.build_prompt("question", &[item("a", 0, 0.9, &long), item("b", 0, 0.8, &long)]);
            assert!(prompt.chars().count() <= budget, "budget {budget}");
        }
    }
}

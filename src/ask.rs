//! One-shot question answering from the command line.
//!
//! `dq ask` and `dq extract` build a fresh in-memory corpus from the files
//! and text given on the command line, run a single query, and print the
//! result. Nothing persists between invocations.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use docuquery_core::models::{Answer, RankedPassage, Span};
use docuquery_core::CorpusManager;

use crate::config::Config;
use crate::extract::extract_file;

/// Inputs shared by `ask` and `extract`.
#[derive(Debug, Clone, Default)]
pub struct QueryInputs {
    pub files: Vec<PathBuf>,
    pub texts: Vec<String>,
    pub top_k: Option<usize>,
    /// Restrict retrieval to documents with these titles (file names).
    pub only: Vec<String>,
    pub json: bool,
}

/// Ingest every input. Returns `(title, document_id)` pairs in input order.
pub async fn load_inputs(
    corpus: &CorpusManager,
    inputs: &QueryInputs,
) -> Result<Vec<(String, String)>> {
    if inputs.files.is_empty() && inputs.texts.is_empty() {
        bail!("no documents given: pass --file <path> or --text <text>");
    }

    let mut loaded = Vec::new();
    for path in &inputs.files {
        let title = file_title(path);
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (kind, text) = extract_file(&title, &bytes)?;
        let id = corpus
            .ingest_file_text(&text, &title, kind)
            .await
            .with_context(|| format!("Failed to ingest {}", path.display()))?;
        loaded.push((title, id));
    }
    for (i, text) in inputs.texts.iter().enumerate() {
        let title = format!("text-{}", i + 1);
        let id = corpus
            .ingest_text(text, Some(&title))
            .await
            .with_context(|| format!("Failed to ingest --text #{}", i + 1))?;
        loaded.push((title, id));
    }
    Ok(loaded)
}

fn file_title(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Map `--only` titles onto the ids of the loaded documents.
fn resolve_filter(loaded: &[(String, String)], only: &[String]) -> Result<Option<Vec<String>>> {
    if only.is_empty() {
        return Ok(None);
    }
    let mut ids = Vec::with_capacity(only.len());
    for title in only {
        match loaded.iter().find(|(t, _)| t == title) {
            Some((_, id)) => ids.push(id.clone()),
            None => bail!("--only '{}' does not match any loaded document", title),
        }
    }
    Ok(Some(ids))
}

pub async fn run_ask(config: &Config, query: &str, inputs: &QueryInputs) -> Result<()> {
    let corpus = crate::build_corpus(config)?;
    let loaded = load_inputs(&corpus, inputs).await?;
    let filter = resolve_filter(&loaded, &inputs.only)?;

    let answer = corpus.query(query, inputs.top_k, filter.as_deref()).await?;
    if inputs.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }
    Ok(())
}

pub async fn run_extract(config: &Config, query: &str, inputs: &QueryInputs) -> Result<()> {
    let corpus = crate::build_corpus(config)?;
    let loaded = load_inputs(&corpus, inputs).await?;
    let filter = resolve_filter(&loaded, &inputs.only)?;

    let passages = corpus
        .extract_passages(query, inputs.top_k, filter.as_deref())
        .await?;
    if inputs.json {
        println!("{}", serde_json::to_string_pretty(&passages)?);
        return Ok(());
    }
    if passages.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_passages(&passages);
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    println!();
    println!(
        "confidence: {:.2} ({:?}, {:?})",
        answer.confidence, answer.confidence_label, answer.strategy
    );
    if let Some(reason) = &answer.fallback_reason {
        println!("fallback: {}", reason);
    }
    println!();
    println!("--- Sources ({}) ---", answer.sources.len());
    print_passages(&answer.sources);
}

fn print_passages(passages: &[RankedPassage]) {
    for (i, p) in passages.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} (passage {}, chars {}..{})",
            i + 1,
            p.score,
            p.document_title,
            p.passage_id.sequence,
            p.start,
            p.end
        );
        println!("    confidence: {:?}", p.confidence);
        println!(
            "    excerpt: \"{}\"",
            mark_highlights(&p.text, &p.highlights)
                .replace('\n', " ")
                .trim()
        );
        println!();
    }
}

/// Wrap highlighted spans in `**`. Span offsets are chars.
pub fn mark_highlights(text: &str, spans: &[Span]) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * 4);
    let mut spans = spans.iter().peekable();
    for (i, c) in text.chars().enumerate() {
        if spans.peek().is_some_and(|s| s.start == i) {
            out.push_str("**");
        }
        out.push(c);
        if let Some(s) = spans.peek() {
            if s.end == i + 1 {
                out.push_str("**");
                spans.next();
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docuquery_core::config::EngineConfig;

    #[test]
    fn test_mark_highlights() {
        let spans = vec![Span { start: 0, end: 4 }, Span { start: 9, end: 13 }];
        assert_eq!(mark_highlights("rust and rust", &spans), "**rust** and **rust**");
        assert_eq!(mark_highlights("café", &[Span { start: 3, end: 4 }]), "caf**é**");
        assert_eq!(mark_highlights("plain", &[]), "plain");
    }

    #[tokio::test]
    async fn test_load_inputs_and_filter() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Helm charts package Kubernetes apps.").unwrap();

        let corpus = CorpusManager::lexical(EngineConfig::default()).unwrap();
        let inputs = QueryInputs {
            files: vec![path],
            texts: vec!["Terraform provisions infrastructure.".to_string()],
            ..QueryInputs::default()
        };
        let loaded = load_inputs(&corpus, &inputs).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0, "notes.txt");
        assert_eq!(loaded[1].0, "text-1");

        let ids = resolve_filter(&loaded, &["notes.txt".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(ids, vec![loaded[0].1.clone()]);
        assert!(resolve_filter(&loaded, &["missing.pdf".to_string()]).is_err());
        assert!(resolve_filter(&loaded, &[]).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_inputs_is_an_error() {
        let corpus = CorpusManager::lexical(EngineConfig::default()).unwrap();
        assert!(load_inputs(&corpus, &QueryInputs::default()).await.is_err());
    }
}

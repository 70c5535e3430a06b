//! # DocuQuery
//!
//! Ask questions about your documents. Upload PDF, DOCX, or plain-text
//! files (or paste text), and DocuQuery chunks them into overlapping
//! passages, ranks the passages against a question, and composes an answer
//! with cited sources and a confidence label.
//!
//! The retrieval engine lives in the `docuquery-core` crate. This crate
//! wraps it with configuration, file extraction, HTTP providers, a JSON
//! API, and the `dq` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────────────┐   ┌──────────────┐
//! │  Extract   │──▶│        CorpusManager          │──▶│   Composer   │
//! │ PDF/DOCX/… │   │ chunk → index → rank (core)   │   │ extract/LLM  │
//! └────────────┘   └──────────────┬───────────────┘   └──────────────┘
//!                                 │
//!                     ┌───────────┴──────────┐
//!                     ▼                      ▼
//!                ┌──────────┐          ┌──────────┐
//!                │   CLI    │          │   HTTP   │
//!                │  (dq)    │          │  (axum)  │
//!                └──────────┘          └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Text extraction from uploaded files |
//! | [`embedding`] | Embedding providers for the dense backend |
//! | [`completion`] | Completion providers for generative answers |
//! | [`server`] | JSON HTTP API |
//! | [`ask`] | One-shot `ask` / `extract` commands |
//! | [`chunk`] | `chunk` preview command |

pub mod ask;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod server;

use anyhow::Result;
use docuquery_core::config::BackendKind;
use docuquery_core::CorpusManager;

use crate::config::Config;

/// Build an empty corpus from configuration.
///
/// The embedding provider is only created for the dense backend, and the
/// completion provider only when `[completion]` is enabled.
pub fn build_corpus(config: &Config) -> Result<CorpusManager> {
    let engine = config.engine()?;
    let embedder = match engine.backend {
        BackendKind::Dense => Some(embedding::create_embedder(&config.embedding)?),
        BackendKind::Lexical => None,
    };
    let composer = completion::create_composer(&config.completion, &engine)?;
    tracing::debug!(
        backend = ?engine.backend,
        strategy = ?composer.strategy().kind(),
        "building corpus"
    );
    Ok(CorpusManager::new(engine, embedder, composer)?)
}

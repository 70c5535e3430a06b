//! # DocuQuery Core
//!
//! In-memory document question answering: chunking, a pluggable passage
//! index (TF-IDF or dense embeddings), ranking with confidence labels and
//! highlights, and answer composition (extractive or generative).
//!
//! The entry point is [`corpus::CorpusManager`]. File parsing, HTTP
//! providers, and the web server live in the `docuquery` crate.

pub mod chunk;
pub mod completion;
pub mod compose;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod rank;
pub mod text;

pub use corpus::CorpusManager;
pub use error::{CoreError, ProviderError, Result};

//! `dq chunk`: preview how a file would be split into passages.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use docuquery_core::chunk::chunk_text;
use docuquery_core::config::ChunkParams;
use docuquery_core::models::SourceKind;
use docuquery_core::text::normalize_text;

use crate::config::Config;
use crate::extract::extract_file;

#[derive(Debug, Serialize)]
pub struct ChunkPreview {
    pub file: String,
    pub kind: SourceKind,
    pub char_count: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub passages: Vec<PassagePreview>,
}

#[derive(Debug, Serialize)]
pub struct PassagePreview {
    pub sequence: usize,
    pub start: usize,
    pub end: usize,
    pub hash: String,
    pub preview: String,
}

/// First `max` chars of `text` on one line.
fn preview(text: &str, max: usize) -> String {
    let line = text.replace('\n', " ");
    let mut out: String = line.chars().take(max).collect();
    if line.chars().count() > max {
        out.push_str("...");
    }
    out
}

pub fn chunk_file(path: &Path, params: &ChunkParams) -> Result<ChunkPreview> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (kind, text) = extract_file(&file, &bytes)?;
    let text = normalize_text(&text);

    let passages = chunk_text(&file, &text, params)
        .into_iter()
        .map(|p| PassagePreview {
            sequence: p.sequence(),
            start: p.start,
            end: p.end,
            hash: p.hash[..12].to_string(),
            preview: preview(&p.text, 60),
        })
        .collect();

    Ok(ChunkPreview {
        file,
        kind,
        char_count: text.chars().count(),
        chunk_size: params.chunk_size(),
        overlap: params.overlap(),
        passages,
    })
}

pub fn run_chunk(
    config: &Config,
    path: &Path,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
    json: bool,
) -> Result<()> {
    let params = ChunkParams::new(
        chunk_size.unwrap_or(config.chunking.chunk_size),
        overlap.unwrap_or(config.chunking.overlap),
    )?;
    let result = chunk_file(path, &params)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "{} ({}, {} chars) -> {} passages (size {}, overlap {})",
        result.file,
        result.kind,
        result.char_count,
        result.passages.len(),
        result.chunk_size,
        result.overlap
    );
    for p in &result.passages {
        println!(
            "  [{}] {:>7}..{:<7} {}  \"{}\"",
            p.sequence, p.start, p.end, p.hash, p.preview
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_file_offsets() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(250)).unwrap();

        let result = chunk_file(&path, &ChunkParams::new(100, 20).unwrap()).unwrap();
        let offsets: Vec<(usize, usize)> =
            result.passages.iter().map(|p| (p.start, p.end)).collect();
        assert_eq!(offsets, vec![(0, 100), (80, 180), (160, 250)]);
        assert_eq!(result.kind, SourceKind::PlainText);
        assert_eq!(result.passages[0].hash.len(), 12);
        assert!(result.passages[0].preview.ends_with("..."));
    }

    #[test]
    fn test_chunk_rejects_unknown_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("slides.pptx");
        std::fs::write(&path, "x").unwrap();
        assert!(chunk_file(&path, &ChunkParams::default()).is_err());
    }
}

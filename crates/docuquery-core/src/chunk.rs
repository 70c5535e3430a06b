//! Sliding-window character chunker.
//!
//! Splits a document's text into overlapping [`Passage`]s of at most
//! `chunk_size` characters. Boundaries are purely character based; there
//! is no sentence or token snapping.
//!
//! # Algorithm
//!
//! 1. Start at offset 0.
//! 2. Emit `[start, min(start + chunk_size, len))`.
//! 3. Stop if that passage reached the end of the text.
//! 4. Otherwise advance `start` by `chunk_size - overlap` and repeat.
//!
//! Because [`ChunkParams`] guarantees `overlap < chunk_size`, every step
//! moves forward and the loop terminates.
//!
//! # Example
//!
//! ```rust
//! use docuquery_core::chunk::chunk;
//!
//! let text = "x".repeat(3000);
//! let passages = chunk("doc-1", &text, 1200, 200).unwrap();
//! let spans: Vec<_> = passages.iter().map(|p| (p.start, p.end)).collect();
//! assert_eq!(spans, vec![(0, 1200), (1000, 2200), (2000, 3000)]);
//! ```

use sha2::{Digest, Sha256};

use crate::config::ChunkParams;
use crate::error::Result;
use crate::models::{Passage, PassageId};

/// Validate `chunk_size`/`overlap` and chunk `text`.
///
/// Fails with [`CoreError::Configuration`](crate::error::CoreError) when
/// `chunk_size == 0` or `overlap >= chunk_size`.
pub fn chunk(document_id: &str, text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Passage>> {
    let params = ChunkParams::new(chunk_size, overlap)?;
    Ok(chunk_text(document_id, text, &params))
}

/// Chunk `text` with already-validated parameters.
///
/// Returns no passages for empty text and exactly one passage when the
/// text fits in a single window.
pub fn chunk_text(document_id: &str, text: &str, params: &ChunkParams) -> Vec<Passage> {
    // Byte offset of every char boundary, plus the end of the string.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let len = bounds.len();
    bounds.push(text.len());

    let mut passages = Vec::with_capacity(len / params.step() + 1);
    let mut start = 0usize;
    while start < len {
        let end = (start + params.chunk_size()).min(len);
        let slice = &text[bounds[start]..bounds[end]];
        passages.push(make_passage(document_id, passages.len(), start, end, slice));
        if end == len {
            break;
        }
        start += params.step();
    }
    passages
}

fn make_passage(document_id: &str, sequence: usize, start: usize, end: usize, text: &str) -> Passage {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Passage {
        id: PassageId::new(document_id, sequence),
        start,
        end,
        text: text.to_string(),
        hash,
    }
}

/// Rebuild the original text from consecutive passages by dropping the
/// overlapping prefix of each passage after the first.
pub fn reassemble(passages: &[Passage]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for p in passages {
        let skip = covered.saturating_sub(p.start);
        out.extend(p.text.chars().skip(skip));
        covered = covered.max(p.end);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn params(size: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(size, overlap).unwrap()
    }

    #[test]
    fn test_short_text_single_passage() {
        let passages = chunk_text("doc1", "Hello, world!", &params(100, 20));
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].start, 0);
        assert_eq!(passages[0].end, 13);
        assert_eq!(passages[0].text, "Hello, world!");
    }

    #[test]
    fn test_exact_fit_single_passage() {
        let text = "a".repeat(50);
        let passages = chunk_text("doc1", &text, &params(50, 10));
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].end, 50);
    }

    #[test]
    fn test_empty_text_no_passages() {
        assert!(chunk_text("doc1", "", &params(10, 2)).is_empty());
    }

    #[test]
    fn test_three_window_layout() {
        let text: String = (0..3000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let passages = chunk("doc1", &text, 1200, 200).unwrap();
        let spans: Vec<(usize, usize)> = passages.iter().map(|p| (p.start, p.end)).collect();
        assert_eq!(spans, vec![(0, 1200), (1000, 2200), (2000, 3000)]);
        assert_eq!(reassemble(&passages), text);
    }

    #[test]
    fn test_overlap_not_smaller_than_size_fails() {
        let err = chunk("doc1", "some text", 10, 10).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        let err = chunk("doc1", "some text", 10, 25).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn test_offsets_monotonic_and_reconstruct() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(37);
        for (size, overlap) in [(7, 0), (7, 6), (50, 13), (64, 1), (1, 0), (300, 299)] {
            let passages = chunk_text("doc1", &text, &params(size, overlap));
            assert_eq!(passages.last().unwrap().end, text.chars().count());
            for w in passages.windows(2) {
                assert!(w[1].end > w[0].end, "end must advance for {size}/{overlap}");
                assert!(w[1].start > w[0].start);
                if overlap > 0 {
                    assert!(w[1].start < w[0].end);
                }
            }
            assert_eq!(reassemble(&passages), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_sequences_contiguous() {
        let text = "x".repeat(95);
        let passages = chunk_text("doc1", &text, &params(10, 3));
        for (i, p) in passages.iter().enumerate() {
            assert_eq!(p.sequence(), i);
            assert_eq!(p.document_id(), "doc1");
        }
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let text = "┌──┐ héllo wörld ✓✓✓";
        let passages = chunk_text("doc1", text, &params(6, 2));
        assert_eq!(passages[0].text.chars().count(), 6);
        assert_eq!(passages.last().unwrap().end, text.chars().count());
        assert_eq!(reassemble(&passages), text);
    }

    #[test]
    fn test_deterministic_hashes() {
        let text = "Alpha beta gamma delta epsilon";
        let a = chunk_text("doc1", text, &params(8, 2));
        let b = chunk_text("doc1", text, &params(8, 2));
        assert_eq!(a, b);
        assert_eq!(a[0].hash.len(), 64);
    }
}

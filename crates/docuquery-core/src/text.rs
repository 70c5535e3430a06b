//! Text helpers: normalization, tokenization, and stop words.

/// English stop words excluded from highlighting (and, when enabled,
/// from the TF-IDF vocabulary). Sorted for binary search.
const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "being", "between", "both", "but", "by", "can", "could", "did", "do",
    "does", "doing", "during", "each", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is",
    "it", "its", "just", "me", "more", "most", "my", "no", "nor", "not", "of", "off", "on",
    "once", "only", "or", "other", "our", "ours", "out", "over", "own", "same", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until", "up", "very",
    "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "would", "you", "your", "yours",
];

pub fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.binary_search(&term).is_ok()
}

/// Remove carriage returns so `\r\n` and `\r` line endings become `\n`.
pub fn normalize_text(text: &str) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_string()
    }
}

/// Lowercase a single char without changing the char count.
///
/// Characters whose lowercase form expands to several chars keep only
/// the first, so offsets computed on the folded text stay valid for the
/// original.
pub fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split text into lowercase word tokens of at least `min_len` chars.
///
/// A token is a maximal run of alphanumeric characters or underscores.
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for c in text.chars() {
        if is_word_char(c) {
            current.push(fold_char(c));
            current_len += 1;
        } else if !current.is_empty() {
            if current_len >= min_len {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            current_len = 0;
        }
    }
    if !current.is_empty() && current_len >= min_len {
        tokens.push(current);
    }
    tokens
}

/// Number of chars in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `char_idx`-th char, or `s.len()` past the end.
pub fn byte_offset(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Truncate to at most `max_chars`, backing off to the last space when the
/// text is cut, and append `...`.
pub fn truncate_on_word(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    let cut = &text[..byte_offset(text, max_chars)];
    let head = match cut.rfind(' ') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut,
    };
    format!("{}...", head.trim_end())
}

//! Word-window text chunker.
//!
//! Splits document text into overlapping spans of whitespace-separated
//! words. A window starts every `chunk_size - overlap` words and holds up
//! to `chunk_size` words, so consecutive full chunks share exactly
//! `overlap` words and a text of `n` words yields
//! `ceil(n / (chunk_size - overlap))` chunks.
//!
//! The output is deterministic for a given `(content, chunk_size, overlap)`
//! and covers every word of the input. Chunks near the end may be shorter
//! than `chunk_size`. Empty (or all-whitespace) content yields no chunks.
//!
//! # Example
//!
//! ```rust
//! use context_memory_core::chunk::chunk_words;
//!
//! let chunks = chunk_words("one two three four five six", 3, 1);
//! assert_eq!(chunks, vec!["one two three", "three four five", "five six"]);
//! ```

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Split `content` into overlapping word windows.
///
/// Parameter validity (`chunk_size > overlap`) is checked at the transport
/// boundary. Degenerate values are clamped to a stride of one word instead
/// of panicking.
pub fn chunk_words(content: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let size = chunk_size.max(1);
    let stride = size.saturating_sub(overlap).max(1);

    (0..words.len())
        .step_by(stride)
        .map(|start| {
            let end = (start + size).min(words.len());
            words[start..end].join(" ")
        })
        .collect()
}

/// Chunk a document's content and attach index and content hash.
pub fn chunk_document(
    document_id: &str,
    content: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    chunk_words(content, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            parent_id: document_id.to_string(),
            index,
            hash: content_hash(&text),
            text,
        })
        .collect()
}

/// Deterministic storage key for a document's chunk.
///
/// Vector stores key entries by this value so re-ingesting a document
/// overwrites its chunks instead of duplicating them.
pub fn chunk_key(document_id: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(b":");
    hasher.update(index.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hex digest of a text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    /// Rejoin chunks, dropping the `overlap` leading words of every chunk
    /// after the first.
    fn reconstruct(chunks: &[String], overlap: usize) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            out.extend(chunk.split_whitespace().skip(skip).map(str::to_string));
        }
        out
    }

    #[test]
    fn test_empty_content() {
        assert!(chunk_words("", 100, 10).is_empty());
        assert!(chunk_words("  \n\t ", 100, 10).is_empty());
    }

    #[test]
    fn test_short_content_single_chunk() {
        let chunks = chunk_words("hello   world\nagain", 100, 10);
        assert_eq!(chunks, vec!["hello world again"]);
    }

    #[test]
    fn test_chunk_count_close_to_ceiling() {
        for (n, size, overlap) in [(1000, 100, 10), (250, 50, 0), (130, 100, 90), (7, 3, 1)] {
            let chunks = chunk_words(&words(n), size, overlap);
            let stride = size - overlap;
            let expected = n.div_ceil(stride) as i64;
            let actual = chunks.len() as i64;
            assert!(
                (actual - expected).abs() <= 1,
                "n={n} size={size} overlap={overlap}: {actual} vs {expected}"
            );
        }
    }

    #[test]
    fn test_reconstructs_word_sequence() {
        let text = words(537);
        let original: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        for (size, overlap) in [(100, 10), (64, 0), (10, 9)] {
            let chunks = chunk_words(&text, size, overlap);
            assert_eq!(reconstruct(&chunks, overlap), original);
        }
    }

    #[test]
    fn test_last_chunk_may_be_shorter() {
        let chunks = chunk_words(&words(25), 10, 2);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].split_whitespace().count(), 10);
        assert_eq!(chunks[2].split_whitespace().count(), 9);
        assert_eq!(chunks[3], "w24");
    }

    #[test]
    fn test_degenerate_parameters_do_not_panic() {
        let text = words(5);
        assert_eq!(chunk_words(&text, 0, 0).len(), 5);
        assert_eq!(chunk_words(&text, 2, 5).len(), 5);
    }

    #[test]
    fn test_chunk_document_is_deterministic() {
        let text = words(40);
        let a = chunk_document("doc1", &text, 10, 3);
        let b = chunk_document("doc1", &text, 10, 3);
        assert_eq!(a, b);
        for (i, c) in a.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.parent_id, "doc1");
            assert_eq!(c.hash, content_hash(&c.text));
        }
    }

    #[test]
    fn test_chunk_key_distinguishes_documents_and_indices() {
        assert_eq!(chunk_key("a", 0), chunk_key("a", 0));
        assert_ne!(chunk_key("a", 0), chunk_key("a", 1));
        assert_ne!(chunk_key("a", 0), chunk_key("b", 0));
    }
}

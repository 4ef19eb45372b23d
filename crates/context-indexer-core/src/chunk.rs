//! Sliding-window text chunker.
//!
//! Splits document content into fixed-size, overlapping windows measured in
//! characters (not bytes), so multi-byte text never splits mid-character.
//!
//! # Algorithm
//!
//! 1. Reject `chunk_size == 0` and `overlap >= chunk_size` (the window would
//!    never advance).
//! 2. Content no longer than `chunk_size` becomes a single chunk.
//! 3. Otherwise emit `[start, start + chunk_size)` clamped to the content
//!    length; the next window starts at `end - overlap`. Stop once a window
//!    reaches the end of the content.
//!
//! For 2,500 characters with `chunk_size = 1000, overlap = 200` the windows
//! are `[0, 1000)`, `[800, 1800)`, `[1600, 2500)`.
//!
//! # Example
//!
//! ```rust
//! use context_indexer_core::chunk::chunk_text;
//!
//! let text = "a".repeat(2500);
//! let spans = chunk_text(&text, 1000, 200).unwrap();
//! let starts: Vec<usize> = spans.iter().map(|s| s.start_position).collect();
//! assert_eq!(starts, vec![0, 800, 1600]);
//! assert_eq!(spans[2].end_position, 2500);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::DocumentChunk;

/// Approximate characters-per-token ratio used for token estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// A chunk window before it is attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: usize,
    pub text: String,
    pub start_position: usize,
    pub end_position: usize,
    pub overlap_with_previous: usize,
    pub overlap_with_next: usize,
    pub token_count: usize,
}

impl ChunkSpan {
    /// Turn the span into a [`DocumentChunk`] owned by `document_id`.
    pub fn into_chunk(self, document_id: &str) -> DocumentChunk {
        let hash = content_hash(&self.text);
        DocumentChunk {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            content: self.text,
            embedding: None,
            index: self.index,
            start_position: self.start_position,
            end_position: self.end_position,
            overlap_with_previous: self.overlap_with_previous,
            overlap_with_next: self.overlap_with_next,
            token_count: self.token_count,
            importance: None,
            hash,
        }
    }
}

/// Validate chunking parameters.
pub fn validate_params(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::InvalidConfiguration(
            "chunk size must be greater than 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(Error::InvalidConfiguration(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Split `content` into overlapping windows of `chunk_size` characters.
///
/// Always returns at least one span (empty content yields one empty span).
/// Indices are contiguous from 0 and, for consecutive spans,
/// `prev.end_position - prev.overlap_with_next == next.start_position`.
pub fn chunk_text(content: &str, chunk_size: usize, overlap: usize) -> Result<Vec<ChunkSpan>> {
    validate_params(chunk_size, overlap)?;

    // Byte offset of every char boundary, including the end of the string.
    let bounds: Vec<usize> = content
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(content.len()))
        .collect();
    let char_len = bounds.len() - 1;

    if char_len <= chunk_size {
        return Ok(vec![ChunkSpan {
            index: 0,
            text: content.to_string(),
            start_position: 0,
            end_position: char_len,
            overlap_with_previous: 0,
            overlap_with_next: 0,
            token_count: estimate_tokens(char_len),
        }]);
    }

    let mut spans = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(char_len);
        let is_last = end == char_len;
        spans.push(ChunkSpan {
            index: spans.len(),
            text: content[bounds[start]..bounds[end]].to_string(),
            start_position: start,
            end_position: end,
            overlap_with_previous: if start == 0 { 0 } else { overlap },
            overlap_with_next: if is_last { 0 } else { overlap },
            token_count: estimate_tokens(end - start),
        });
        if is_last {
            break;
        }
        start = end - overlap;
    }

    Ok(spans)
}

/// Estimate tokens for `chars` characters (rounded up).
pub fn estimate_tokens(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// SHA-256 hex digest of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

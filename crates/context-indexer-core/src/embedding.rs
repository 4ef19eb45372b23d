//! Embedding provider trait and pure text/vector helpers.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement. Concrete providers (OpenAI, Ollama, hash, disabled) and the
//! retrying client live in the `context-indexer` app crate.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A backend that turns text into fixed-length vectors.
///
/// Implementations perform a single attempt per call; retry, input
/// normalization, and dimension checks are layered on top by the client.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider identity (e.g. `"openai"`, `"hash"`).
    fn name(&self) -> &str;
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts in one logical call, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Normalize text before embedding.
///
/// Collapses every whitespace run to a single space, trims the ends, and
/// strips characters that carry no meaning for an embedding model:
/// control characters, zero-width characters, byte-order marks, the
/// Unicode replacement character, and private-use code points.
///
/// ```rust
/// use context_indexer_core::embedding::normalize_text;
///
/// assert_eq!(normalize_text("  hello\n\n\tworld\u{200B} "), "hello world");
/// assert_eq!(normalize_text(" \u{FFFD}\u{0007} "), "");
/// ```
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if is_disallowed(ch) {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out
}

fn is_disallowed(ch: char) -> bool {
    ch.is_control()
        || matches!(
            ch,
            '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{FFFD}' | '\u{E000}'..='\u{F8FF}'
        )
}

/// Truncate `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Check that a raw provider value is an array of exactly `dims` numbers.
///
/// Returns `false` for `null`, non-array values, wrong lengths, and arrays
/// containing non-numeric entries.
///
/// ```rust
/// use context_indexer_core::embedding::validate_dimensions;
/// use serde_json::json;
///
/// assert!(validate_dimensions(&json!([0.1, 0.2, 0.3]), 3));
/// assert!(!validate_dimensions(&json!([0.1, 0.2]), 3));
/// assert!(!validate_dimensions(&json!(null), 3));
/// assert!(!validate_dimensions(&json!("0.1,0.2,0.3"), 3));
/// ```
pub fn validate_dimensions(value: &Value, dims: usize) -> bool {
    match value.as_array() {
        Some(items) => items.len() == dims && items.iter().all(Value::is_number),
        None => false,
    }
}

/// Convert a validated JSON array into a float vector.
///
/// Returns `None` when [`validate_dimensions`] would reject the value.
pub fn json_to_vector(value: &Value, dims: usize) -> Option<Vec<f32>> {
    if !validate_dimensions(value, dims) {
        return None;
    }
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
}

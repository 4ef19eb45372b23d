//! Relevance scoring.
//!
//! Two scoring paths feed [`SearchResult`](crate::models::SearchResult)s:
//!
//! - **Semantic** (primary): cosine similarity between embeddings,
//!   clamped into `[0, 1]`.
//! - **Lexical fallback** (degraded): used only when one side has no vector.
//!   A fixed substring heuristic that is tagged
//!   [`ScoreKind::LexicalFallback`] wherever it is reported.
//!
//! # Formula
//!
//! ```text
//!            a · b
//! cos(θ) = ─────────      clamped to [0, 1]; zero-magnitude → 0
//!          ‖a‖ × ‖b‖
//! ```

use crate::models::{Highlight, ScoreKind};

/// Fallback score when the query appears in the title.
pub const LEXICAL_TITLE_MATCH: f64 = 0.9;
/// Fallback score when the query appears in the content.
pub const LEXICAL_CONTENT_MATCH: f64 = 0.7;
/// Fallback score when the query appears nowhere.
pub const LEXICAL_NO_MATCH: f64 = 0.3;

/// Maximum number of highlight spans reported per result.
pub const MAX_HIGHLIGHTS: usize = 5;

/// Cosine similarity clamped into `[0, 1]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, and
/// zero-magnitude vectors. Negative similarity is clamped to `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON || !denom.is_finite() {
        return 0.0;
    }

    let sim = dot / denom;
    if sim.is_nan() {
        0.0
    } else {
        sim.clamp(0.0, 1.0)
    }
}

/// Degraded-mode score from case-insensitive substring matching.
///
/// Title match beats content match beats no match.
pub fn lexical_score(query: &str, title: &str, content: &str) -> f64 {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return LEXICAL_NO_MATCH;
    }
    if title.to_lowercase().contains(&needle) {
        LEXICAL_TITLE_MATCH
    } else if content.to_lowercase().contains(&needle) {
        LEXICAL_CONTENT_MATCH
    } else {
        LEXICAL_NO_MATCH
    }
}

/// Score a candidate, preferring true vector similarity.
///
/// `candidate_vectors` holds every vector available for the candidate (the
/// whole-document embedding plus chunk embeddings); the best match wins.
/// Falls back to [`lexical_score`] when the query or the candidate has no
/// vector at all.
pub fn score_candidate(
    query: &str,
    query_vec: Option<&[f32]>,
    title: &str,
    content: &str,
    candidate_vectors: &[&[f32]],
) -> (f64, ScoreKind) {
    match query_vec {
        Some(qv) if !candidate_vectors.is_empty() => {
            let best = candidate_vectors
                .iter()
                .map(|v| cosine_similarity(qv, v))
                .fold(0.0f64, f64::max);
            (best, ScoreKind::Semantic)
        }
        _ => (
            lexical_score(query, title, content),
            ScoreKind::LexicalFallback,
        ),
    }
}

/// Whether a score passes the query's similarity threshold.
pub fn passes_threshold(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Character spans of query-term occurrences in `content`.
///
/// Terms are whitespace-separated and matched case-insensitively; at most
/// [`MAX_HIGHLIGHTS`] spans are returned, ordered by position.
pub fn highlight_spans(query: &str, content: &str) -> Vec<Highlight> {
    let haystack: Vec<char> = content.chars().flat_map(char::to_lowercase).collect();
    // Lower-casing can change char counts; fall back to no highlights then.
    if haystack.len() != content.chars().count() {
        return Vec::new();
    }

    let mut spans: Vec<Highlight> = Vec::new();
    for term in query.split_whitespace() {
        let needle: Vec<char> = term.chars().flat_map(char::to_lowercase).collect();
        if needle.is_empty() || needle.len() > haystack.len() {
            continue;
        }
        for start in 0..=(haystack.len() - needle.len()) {
            if haystack[start..start + needle.len()] == needle[..] {
                spans.push(Highlight {
                    start,
                    end: start + needle.len(),
                });
            }
        }
    }

    spans.sort_by_key(|h| (h.start, h.end));
    spans.dedup();
    spans.truncate(MAX_HIGHLIGHTS);
    spans
}

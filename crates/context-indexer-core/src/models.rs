//! Core data models used throughout Context Indexer.
//!
//! These types represent the documents, chunks, queries, and search results
//! that flow between the ingestion orchestrator and the vector store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default number of results returned by a search.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Upper bound accepted for [`SearchQuery::limit`].
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Default minimum similarity for a result to be returned.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Lifecycle of a document inside the orchestrator.
///
/// ```text
/// pending ──▶ processing ──▶ completed
///                  │
///                  └──────▶ failed ──(retry)──▶ pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Pending, DocumentStatus::Processing)
                | (DocumentStatus::Processing, DocumentStatus::Completed)
                | (DocumentStatus::Processing, DocumentStatus::Failed)
                | (DocumentStatus::Failed, DocumentStatus::Pending)
        )
    }

    /// Only completed documents are visible to search consumers.
    pub fn is_searchable(self) -> bool {
        self == DocumentStatus::Completed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

/// Descriptive metadata attached to a [`Document`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Where the content came from (e.g. `"self-index"`, `"api"`).
    #[serde(default)]
    pub source: String,
    /// Content category (e.g. `"documentation"`, `"code"`, `"text"`).
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Size of the original content in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Path of the originating file, relative to the indexed root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Arbitrary caller-defined fields.
    #[serde(default)]
    pub custom: Map<String, Value>,
}

/// Partial metadata used by document updates.
///
/// `Some` fields replace the stored value; `custom` entries are merged
/// key by key into the stored map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataUpdate {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub custom: Map<String, Value>,
}

impl DocumentMetadata {
    /// Apply a [`MetadataUpdate`] on top of this metadata.
    pub fn merge(&mut self, update: &MetadataUpdate) {
        if let Some(source) = &update.source {
            self.source = source.clone();
        }
        if let Some(content_type) = &update.content_type {
            self.content_type = content_type.clone();
        }
        if let Some(tags) = &update.tags {
            self.tags = tags.clone();
        }
        if let Some(language) = &update.language {
            self.language = Some(language.clone());
        }
        if let Some(author) = &update.author {
            self.author = Some(author.clone());
        }
        for (key, value) in &update.custom {
            self.custom.insert(key.clone(), value.clone());
        }
    }
}

/// A positioned, independently embeddable slice of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Zero-based index among sibling chunks.
    pub index: usize,
    /// Character offset of the first character in the parent content.
    pub start_position: usize,
    /// Character offset one past the last character.
    pub end_position: usize,
    pub overlap_with_previous: usize,
    pub overlap_with_next: usize,
    /// Estimated token count (characters-per-token heuristic).
    pub token_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
    /// SHA-256 of `content`.
    pub hash: String,
}

/// A unit of ingested content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub chunks: Vec<DocumentChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    pub status: DocumentStatus,
}

impl Document {
    /// Build a fresh `pending` document at version 1.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        metadata: DocumentMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            metadata,
            chunks: Vec::new(),
            embedding: None,
            created_at: now,
            updated_at: now,
            version: 1,
            status: DocumentStatus::Pending,
        }
    }

    /// Move to `next` if the transition is legal.
    ///
    /// Returns `false` and leaves the status untouched otherwise.
    pub fn transition(&mut self, next: DocumentStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

/// Inclusive creation-date window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| ts >= from) && self.to.is_none_or(|to| ts <= to)
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }
}

/// Structured filters for [`SearchQuery`]. Empty lists mean "no filter";
/// non-empty lists match if any entry matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub content_types: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    /// Every entry must equal the document's custom field of the same key.
    #[serde(default)]
    pub custom: Map<String, Value>,
}

impl SearchFilters {
    pub fn matches(&self, doc: &Document) -> bool {
        let meta = &doc.metadata;
        if !self.content_types.is_empty() && !self.content_types.contains(&meta.content_type) {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.contains(&meta.source) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| meta.tags.contains(t)) {
            return false;
        }
        if let Some(author) = &self.author {
            if meta.author.as_deref() != Some(author.as_str()) {
                return false;
            }
        }
        if let Some(range) = &self.date_range {
            if !range.contains(doc.created_at) {
                return false;
            }
        }
        self.custom
            .iter()
            .all(|(key, value)| meta.custom.get(key) == Some(value))
    }
}

/// A search request as seen by the orchestrator and the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    /// Minimum score in `[0, 1]` for a result to be returned.
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default)]
    pub include_chunks: bool,
}

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_true() -> bool {
    true
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            include_metadata: true,
            include_chunks: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_chunks(mut self, include: bool) -> Self {
        self.include_chunks = include;
        self
    }
}

/// How a score was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Cosine similarity between real embeddings.
    Semantic,
    /// Degraded substring heuristic; not a measure of semantic similarity.
    LexicalFallback,
}

/// Coarse relevance bucket for a matched chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl Relevance {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Relevance::High
        } else if score >= 0.7 {
            Relevance::Medium
        } else {
            Relevance::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedChunk {
    pub chunk: DocumentChunk,
    pub score: f64,
    pub relevance: Relevance,
}

/// Character span in the document content that matched a query term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    /// Relevance score in `[0, 1]`.
    pub score: f64,
    pub score_kind: ScoreKind,
    #[serde(default)]
    pub matched_chunks: Vec<MatchedChunk>,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
}

/// Store-level statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub count: usize,
    pub collection_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn doc_with(content_type: &str, tags: &[&str]) -> Document {
        Document::new(
            "d1",
            "Title",
            "body",
            DocumentMetadata {
                source: "self-index".into(),
                content_type: content_type.into(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_status_transitions() {
        let mut doc = doc_with("code", &[]);
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(!doc.transition(DocumentStatus::Completed));
        assert!(doc.transition(DocumentStatus::Processing));
        assert!(doc.transition(DocumentStatus::Failed));
        assert!(!doc.transition(DocumentStatus::Completed));
        assert!(doc.transition(DocumentStatus::Pending));
        assert!(doc.transition(DocumentStatus::Processing));
        assert!(doc.transition(DocumentStatus::Completed));
        assert!(doc.status.is_searchable());
    }

    #[test]
    fn test_filters_match_any_tag() {
        let doc = doc_with("code", &["code", "rs"]);
        let filters = SearchFilters {
            tags: vec!["md".into(), "rs".into()],
            ..Default::default()
        };
        assert!(filters.matches(&doc));

        let filters = SearchFilters {
            content_types: vec!["documentation".into()],
            ..Default::default()
        };
        assert!(!filters.matches(&doc));
    }

    #[test]
    fn test_filters_custom_and_dates() {
        let mut doc = doc_with("text", &[]);
        doc.metadata
            .custom
            .insert("team".into(), Value::String("infra".into()));

        let mut custom = Map::new();
        custom.insert("team".into(), Value::String("infra".into()));
        let filters = SearchFilters {
            custom,
            date_range: Some(DateRange {
                from: Some(doc.created_at - Duration::days(1)),
                to: None,
            }),
            ..Default::default()
        };
        assert!(filters.matches(&doc));

        let filters = SearchFilters {
            date_range: Some(DateRange {
                from: Some(doc.created_at + Duration::days(1)),
                to: None,
            }),
            ..Default::default()
        };
        assert!(!filters.matches(&doc));
    }

    #[test]
    fn test_metadata_merge() {
        let mut meta = DocumentMetadata {
            source: "api".into(),
            content_type: "text".into(),
            tags: vec!["a".into()],
            ..Default::default()
        };
        meta.custom.insert("keep".into(), Value::Bool(true));
        let mut custom = Map::new();
        custom.insert("new".into(), Value::from(1));
        meta.merge(&MetadataUpdate {
            tags: Some(vec!["b".into()]),
            custom,
            ..Default::default()
        });
        assert_eq!(meta.source, "api");
        assert_eq!(meta.tags, vec!["b".to_string()]);
        assert_eq!(meta.custom.len(), 2);
    }

    #[test]
    fn test_search_query_defaults_from_json() {
        let q: SearchQuery = serde_json::from_str(r#"{"query": "auth"}"#).unwrap();
        assert_eq!(q.limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(q.offset, 0);
        assert!((q.similarity_threshold - DEFAULT_SIMILARITY_THRESHOLD).abs() < 1e-9);
        assert!(q.include_metadata);
        assert!(!q.include_chunks);
    }
}

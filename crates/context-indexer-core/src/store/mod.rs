//! Vector-store abstraction.
//!
//! The [`VectorStore`] trait is the contract the ingestion orchestrator
//! expects from the external vector store. The store persists documents with
//! their vectors, answers nearest-neighbor or filtered queries, and is the
//! source of truth for reads after a write succeeds.
//!
//! All methods are fallible I/O; callers must not assume atomicity across
//! separate calls.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Document, DocumentMetadata, SearchQuery, SearchResult, StoreStats};

/// Partial update applied by [`VectorStore::update`].
///
/// `None` fields are left untouched. `updated_at` and `version` are always
/// written.
#[derive(Debug, Clone)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub metadata: Option<DocumentMetadata>,
    pub embedding: Option<Vec<f32>>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Abstract vector-store backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put`](VectorStore::put) | Insert or replace a document with its chunks and vectors |
/// | [`get`](VectorStore::get) | Fetch a document by id |
/// | [`update`](VectorStore::update) | Apply a [`DocumentPatch`] |
/// | [`delete`](VectorStore::delete) | Remove a document (absent ids are not an error) |
/// | [`query`](VectorStore::query) | Filtered similarity search |
/// | [`stats`](VectorStore::stats) | Document count and collection name |
/// | [`ping`](VectorStore::ping) | Liveness check |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn put(&self, doc: &Document) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Document>>;

    async fn update(&self, id: &str, patch: &DocumentPatch) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Run a search. `embedding` is the vectorized `query.query` when
    /// available; results must already honor `query.similarity_threshold`,
    /// `offset`, and `limit`.
    async fn query(&self, query: &SearchQuery, embedding: Option<&[f32]>)
        -> Result<Vec<SearchResult>>;

    async fn stats(&self) -> Result<StoreStats>;

    async fn ping(&self) -> bool;
}

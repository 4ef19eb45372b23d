//! In-memory [`VectorStore`] implementation for tests and local runs.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. Queries
//! are brute-force cosine similarity over document and chunk vectors, with
//! the lexical fallback for documents stored without vectors.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{
    Document, MatchedChunk, Relevance, SearchQuery, SearchResult, StoreStats,
};
use crate::scoring::{cosine_similarity, highlight_spans, passes_threshold, score_candidate};

use super::{DocumentPatch, VectorStore};

/// Collection name reported when none is given.
pub const DEFAULT_COLLECTION: &str = "documents";

/// In-memory store for testing and single-process use.
pub struct InMemoryStore {
    collection: String,
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_collection(DEFAULT_COLLECTION)
    }

    pub fn with_collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            docs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored documents, regardless of status.
    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored document, ordered by id.
    pub fn documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .docs
            .read()
            .map(|d| d.values().cloned().collect())
            .unwrap_or_default();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

fn score_document(doc: &Document, query: &SearchQuery, embedding: Option<&[f32]>) -> SearchResult {
    let mut vectors: Vec<&[f32]> = Vec::with_capacity(doc.chunks.len() + 1);
    if let Some(v) = &doc.embedding {
        vectors.push(v.as_slice());
    }
    vectors.extend(doc.chunks.iter().filter_map(|c| c.embedding.as_deref()));

    let (score, score_kind) =
        score_candidate(&query.query, embedding, &doc.title, &doc.content, &vectors);

    let mut matched_chunks: Vec<MatchedChunk> = match embedding {
        Some(qv) => doc
            .chunks
            .iter()
            .filter_map(|c| {
                let v = c.embedding.as_deref()?;
                let chunk_score = cosine_similarity(qv, v);
                passes_threshold(chunk_score, query.similarity_threshold).then(|| MatchedChunk {
                    chunk: c.clone(),
                    score: chunk_score,
                    relevance: Relevance::from_score(chunk_score),
                })
            })
            .collect(),
        None => Vec::new(),
    };
    matched_chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk.index.cmp(&b.chunk.index))
    });

    SearchResult {
        document: doc.clone(),
        score,
        score_kind,
        matched_chunks,
        highlights: highlight_spans(&query.query, &doc.content),
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn put(&self, doc: &Document) -> Result<()> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: &DocumentPatch) -> Result<()> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        let doc = match docs.get_mut(id) {
            Some(d) => d,
            None => bail!("document {} does not exist", id),
        };
        if let Some(title) = &patch.title {
            doc.title = title.clone();
        }
        if let Some(content) = &patch.content {
            doc.content = content.clone();
        }
        if let Some(metadata) = &patch.metadata {
            doc.metadata = metadata.clone();
        }
        if let Some(embedding) = &patch.embedding {
            doc.embedding = Some(embedding.clone());
        }
        doc.updated_at = patch.updated_at;
        doc.version = patch.version;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        docs.remove(id);
        Ok(())
    }

    async fn query(
        &self,
        query: &SearchQuery,
        embedding: Option<&[f32]>,
    ) -> Result<Vec<SearchResult>> {
        let docs = self.docs.read().map_err(poisoned)?;
        let mut results: Vec<SearchResult> = docs
            .values()
            .filter(|d| d.status.is_searchable() && query.filters.matches(d))
            .map(|d| score_document(d, query, embedding))
            .filter(|r| passes_threshold(r.score, query.similarity_threshold))
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.document.updated_at.cmp(&a.document.updated_at))
                .then(a.document.id.cmp(&b.document.id))
        });

        Ok(results
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(StoreStats {
            count: docs.len(),
            collection_name: self.collection.clone(),
        })
    }

    async fn ping(&self) -> bool {
        self.docs.read().is_ok()
    }
}

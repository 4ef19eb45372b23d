//! Ingestion orchestration.
//!
//! [`Ingestor`] owns document construction and drives each document through
//! its lifecycle before handing it to the [`VectorStore`]:
//!
//! ```text
//! request ─▶ validate ─▶ pending ─▶ processing ─▶ embed (+ chunk) ─▶ completed ─▶ store.put
//!                                        │
//!                                        └──▶ failed (nothing persisted)
//! ```
//!
//! When the embedding provider is disabled, documents are stored without
//! vectors and searches use the store's lexical fallback.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use context_indexer_core::chunk::{chunk_text, validate_params};
use context_indexer_core::embedding::normalize_text;
use context_indexer_core::models::{
    Document, DocumentMetadata, DocumentStatus, MetadataUpdate, SearchQuery, SearchResult,
    StoreStats,
};
use context_indexer_core::scoring::passes_threshold;
use context_indexer_core::store::{DocumentPatch, VectorStore};
use context_indexer_core::{Error, Result};

use crate::config::{ChunkingConfig, RetrievalConfig};
use crate::embedding::EmbeddingClient;

/// Input to [`Ingestor::add_document`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddDocumentRequest {
    /// Caller-chosen id; a UUID v4 is allocated when absent or blank.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Input to [`Ingestor::update_document`]. `None` fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<MetadataUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub store: bool,
    pub embedding_provider: String,
    /// `None` when the provider is disabled and no probe was made.
    pub embedding: Option<bool>,
}

/// The ingestion orchestrator.
pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    embedder: EmbeddingClient,
    chunking: ChunkingConfig,
    retrieval: RetrievalConfig,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: EmbeddingClient,
        chunking: ChunkingConfig,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chunking,
            retrieval,
        }
    }

    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Ingest a document with a single whole-content embedding.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] when the content is blank; raised before any
    ///   embedding or store call.
    /// - [`Error::DocumentAdditionFailed`] when embedding or persistence fails.
    pub async fn add_document(&self, request: AddDocumentRequest) -> Result<Document> {
        ensure_content(&request.content)?;
        let mut doc = self.begin(request);

        if let Err(e) = self.embed_whole(&mut doc).await {
            return Err(self.fail(&mut doc, e));
        }
        self.finish(doc).await
    }

    /// Ingest a document, chunking its content and embedding every chunk in
    /// one batch call. Any chunk embedding failure fails the whole request.
    pub async fn add_document_with_chunks(
        &self,
        request: AddDocumentRequest,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Document> {
        validate_params(chunk_size, overlap)?;
        ensure_content(&request.content)?;
        let mut doc = self.begin(request);

        let spans = chunk_text(&doc.content, chunk_size, overlap)?;
        doc.chunks = spans
            .into_iter()
            .map(|span| span.into_chunk(&doc.id))
            .collect();

        if let Err(e) = self.embed_whole(&mut doc).await {
            return Err(self.fail(&mut doc, e));
        }
        if self.embedder.is_enabled() {
            let texts: Vec<String> = doc.chunks.iter().map(|c| c.content.clone()).collect();
            match self.embedder.embed_batch_aligned(&texts).await {
                Ok(vectors) => {
                    for (chunk, vector) in doc.chunks.iter_mut().zip(vectors) {
                        chunk.embedding = vector;
                    }
                }
                Err(e) => return Err(self.fail(&mut doc, e)),
            }
        }

        debug!(id = %doc.id, chunks = doc.chunks.len(), "chunked document");
        self.finish(doc).await
    }

    fn begin(&self, request: AddDocumentRequest) -> Document {
        let id = request
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut doc = Document::new(id, request.title, request.content, request.metadata);
        if doc.metadata.size.is_none() {
            doc.metadata.size = Some(doc.content.len() as u64);
        }
        doc.transition(DocumentStatus::Processing);
        doc
    }

    async fn embed_whole(&self, doc: &mut Document) -> Result<()> {
        if self.embedder.is_enabled() {
            doc.embedding = Some(self.embedder.embed(&doc.content).await?);
        }
        Ok(())
    }

    fn fail(&self, doc: &mut Document, cause: Error) -> Error {
        doc.transition(DocumentStatus::Failed);
        warn!(id = %doc.id, code = cause.code(), error = %cause, "document ingestion failed");
        Error::DocumentAdditionFailed(cause.to_string())
    }

    async fn finish(&self, mut doc: Document) -> Result<Document> {
        doc.transition(DocumentStatus::Completed);
        if let Err(e) = self.store.put(&doc).await {
            warn!(id = %doc.id, error = %e, "store rejected document");
            return Err(Error::DocumentAdditionFailed(format!("{e:#}")));
        }
        info!(id = %doc.id, title = %doc.title, "document added");
        Ok(doc)
    }

    /// Merge `update` into a stored document.
    ///
    /// A content change regenerates the whole-document embedding; existing
    /// chunks are kept as they are. The version is bumped by one,
    /// `updated_at` is refreshed, and `created_at` is preserved.
    pub async fn update_document(&self, id: &str, update: DocumentUpdate) -> Result<Document> {
        let mut doc = self
            .store
            .get(id)
            .await
            .map_err(|e| Error::DocumentUpdateFailed(format!("{e:#}")))?
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;

        let mut patch = DocumentPatch {
            title: None,
            content: None,
            metadata: None,
            embedding: None,
            updated_at: Utc::now(),
            version: doc.version + 1,
        };

        if let Some(title) = update.title {
            doc.title = title.clone();
            patch.title = Some(title);
        }
        if let Some(content) = update.content.filter(|c| *c != doc.content) {
            ensure_content(&content)?;
            if self.embedder.is_enabled() {
                let vector = self
                    .embedder
                    .embed(&content)
                    .await
                    .map_err(|e| Error::DocumentUpdateFailed(e.to_string()))?;
                doc.embedding = Some(vector.clone());
                patch.embedding = Some(vector);
            }
            doc.metadata.size = Some(content.len() as u64);
            doc.content = content.clone();
            patch.content = Some(content);
            patch.metadata = Some(doc.metadata.clone());
        }
        if let Some(meta) = &update.metadata {
            doc.metadata.merge(meta);
            patch.metadata = Some(doc.metadata.clone());
        }

        self.store
            .update(id, &patch)
            .await
            .map_err(|e| Error::DocumentUpdateFailed(format!("{e:#}")))?;

        doc.updated_at = patch.updated_at;
        doc.version = patch.version;
        info!(id, version = doc.version, "document updated");
        Ok(doc)
    }

    /// Delete a document. Deleting an absent id succeeds.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        self.store
            .delete(id)
            .await
            .map_err(|e| Error::DocumentDeletionFailed(format!("{e:#}")))?;
        debug!(id, "document deleted");
        Ok(())
    }

    pub async fn get_document(&self, id: &str) -> Result<Document> {
        self.store
            .get(id)
            .await
            .map_err(|e| Error::DocumentSearchFailed(format!("{e:#}")))?
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    /// Embed the query text and delegate to the store.
    ///
    /// Results below `similarity_threshold` are never returned; a query
    /// nothing passes yields an empty list, not an error.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        if normalize_text(&query.query).is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut query = query.clone();
        query.limit = match query.limit {
            0 => self.retrieval.default_limit,
            n => n.min(self.retrieval.max_limit),
        };

        let embedding = if self.embedder.is_enabled() {
            Some(
                self.embedder
                    .embed(&query.query)
                    .await
                    .map_err(|e| Error::DocumentSearchFailed(e.to_string()))?,
            )
        } else {
            None
        };

        let mut results = self
            .store
            .query(&query, embedding.as_deref())
            .await
            .map_err(|e| Error::DocumentSearchFailed(format!("{e:#}")))?;

        results.retain(|r| passes_threshold(r.score, query.similarity_threshold));
        for result in &mut results {
            shape_result(result, &query);
        }

        debug!(
            query = %query.query,
            results = results.len(),
            semantic = embedding.is_some(),
            "search complete"
        );
        Ok(results)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store
            .stats()
            .await
            .map_err(|e| Error::DocumentSearchFailed(format!("{e:#}")))
    }

    /// Store ping plus embedding connectivity self-test. Never fails.
    pub async fn health(&self) -> HealthReport {
        let store = self.store.ping().await;
        let embedding = if self.embedder.is_enabled() {
            Some(self.embedder.test_connection().await)
        } else {
            None
        };
        HealthReport {
            healthy: store && embedding.unwrap_or(true),
            store,
            embedding_provider: self.embedder.provider_name().to_string(),
            embedding,
        }
    }
}

fn ensure_content(content: &str) -> Result<()> {
    if normalize_text(content).is_empty() {
        Err(Error::EmptyInput)
    } else {
        Ok(())
    }
}

fn shape_result(result: &mut SearchResult, query: &SearchQuery) {
    if !query.include_metadata {
        let meta = &mut result.document.metadata;
        meta.tags.clear();
        meta.custom.clear();
    }
    if !query.include_chunks {
        result.document.chunks.clear();
        result.matched_chunks.clear();
    }
}

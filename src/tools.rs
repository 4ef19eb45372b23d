//! Tool request boundary.
//!
//! Requests arrive as JSON of the form
//! `{"tool": "<name>", "arguments": {...}}` and are parsed into a
//! [`ToolRequest`], one variant per request kind. [`ToolRequest::validate`]
//! rejects malformed input before the orchestrator sees it.
//!
//! | Tool | Arguments |
//! |------|-----------|
//! | `add_document` | `id?`, `title`, `content`, `metadata?` |
//! | `add_document_with_chunks` | as above plus `chunk_size?`, `overlap?` |
//! | `update_document` | `id`, `title?`, `content?`, `metadata?` |
//! | `delete_document` | `id` |
//! | `get_document` | `id` |
//! | `search` | a search query (`query`, `filters?`, `limit?`, ...) |
//! | `trigger_indexing` | none |
//! | `indexing_status` | none |
//! | `stats` | none |
//! | `health` | none |
//!
//! Responses are `{"result": ...}` on success and
//! `{"error": {"code": ..., "message": ...}}` on failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use context_indexer_core::chunk::validate_params;
use context_indexer_core::embedding::normalize_text;
use context_indexer_core::models::{SearchFilters, SearchQuery};
use context_indexer_core::{Error, Result};

use crate::config::RetrievalConfig;
use crate::ingest::{AddDocumentRequest, DocumentUpdate, Ingestor};
use crate::scheduler::SelfIndexer;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChunkedDocumentArgs {
    #[serde(flatten)]
    pub document: AddDocumentRequest,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub overlap: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateDocumentArgs {
    pub id: String,
    #[serde(flatten)]
    pub update: DocumentUpdate,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdArgs {
    pub id: String,
}

/// Search arguments. Absent `limit` and `similarity_threshold` take the
/// configured retrieval defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default)]
    pub include_chunks: bool,
}

fn default_true() -> bool {
    true
}

impl SearchArgs {
    pub fn into_query(self, retrieval: &RetrievalConfig) -> SearchQuery {
        let mut query = retrieval.query(self.query).with_filters(self.filters);
        if let Some(limit) = self.limit {
            query.limit = limit;
        }
        if let Some(threshold) = self.similarity_threshold {
            query.similarity_threshold = threshold;
        }
        query.offset = self.offset;
        query.include_metadata = self.include_metadata;
        query.include_chunks = self.include_chunks;
        query
    }
}

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolRequest {
    AddDocument(AddDocumentRequest),
    AddDocumentWithChunks(ChunkedDocumentArgs),
    UpdateDocument(UpdateDocumentArgs),
    DeleteDocument(IdArgs),
    GetDocument(IdArgs),
    Search(SearchArgs),
    TriggerIndexing,
    IndexingStatus,
    Stats,
    Health,
}

impl ToolRequest {
    /// Parse a JSON request. Malformed JSON and unknown tools are
    /// [`Error::InvalidRequest`].
    pub fn parse(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| Error::InvalidRequest(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::AddDocument(_) => "add_document",
            ToolRequest::AddDocumentWithChunks(_) => "add_document_with_chunks",
            ToolRequest::UpdateDocument(_) => "update_document",
            ToolRequest::DeleteDocument(_) => "delete_document",
            ToolRequest::GetDocument(_) => "get_document",
            ToolRequest::Search(_) => "search",
            ToolRequest::TriggerIndexing => "trigger_indexing",
            ToolRequest::IndexingStatus => "indexing_status",
            ToolRequest::Stats => "stats",
            ToolRequest::Health => "health",
        }
    }

    /// Boundary checks that need no I/O.
    ///
    /// `max_limit` bounds `search.limit`; `default_chunking` fills in absent
    /// chunk parameters before they are checked.
    pub fn validate(&self, max_limit: usize, default_chunking: (usize, usize)) -> Result<()> {
        match self {
            ToolRequest::AddDocument(doc) => validate_new_document(doc),
            ToolRequest::AddDocumentWithChunks(args) => {
                validate_new_document(&args.document)?;
                let size = args.chunk_size.unwrap_or(default_chunking.0);
                let overlap = args.overlap.unwrap_or(default_chunking.1);
                validate_params(size, overlap).map_err(|e| invalid(e.to_string()))
            }
            ToolRequest::UpdateDocument(args) => {
                require_id(&args.id)?;
                let update = &args.update;
                if update.title.is_none() && update.content.is_none() && update.metadata.is_none()
                {
                    return Err(invalid("update_document needs at least one field to change"));
                }
                Ok(())
            }
            ToolRequest::DeleteDocument(args) | ToolRequest::GetDocument(args) => {
                require_id(&args.id)
            }
            ToolRequest::Search(query) => validate_search(query, max_limit),
            ToolRequest::TriggerIndexing
            | ToolRequest::IndexingStatus
            | ToolRequest::Stats
            | ToolRequest::Health => Ok(()),
        }
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidRequest(message.into())
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        Err(invalid("id must not be blank"))
    } else {
        Ok(())
    }
}

fn validate_new_document(doc: &AddDocumentRequest) -> Result<()> {
    if let Some(id) = &doc.id {
        require_id(id)?;
    }
    if normalize_text(&doc.content).is_empty() {
        return Err(Error::EmptyInput);
    }
    Ok(())
}

fn validate_search(args: &SearchArgs, max_limit: usize) -> Result<()> {
    if normalize_text(&args.query).is_empty() {
        return Err(Error::EmptyInput);
    }
    if args.limit.is_some_and(|limit| !(1..=max_limit).contains(&limit)) {
        return Err(invalid(format!("limit must be in 1..={max_limit}")));
    }
    if args
        .similarity_threshold
        .is_some_and(|t| !(0.0..=1.0).contains(&t))
    {
        return Err(invalid("similarity_threshold must be in [0.0, 1.0]"));
    }
    if args
        .filters
        .date_range
        .as_ref()
        .is_some_and(|r| r.is_inverted())
    {
        return Err(invalid("date_range.from must not be after date_range.to"));
    }
    Ok(())
}

/// Executes validated requests against the orchestrator and scheduler.
pub struct ToolHandler {
    ingestor: Arc<Ingestor>,
    indexer: SelfIndexer,
}

impl ToolHandler {
    pub fn new(ingestor: Arc<Ingestor>, indexer: SelfIndexer) -> Self {
        Self { ingestor, indexer }
    }

    /// Validate and execute one request.
    pub async fn dispatch(&self, request: ToolRequest) -> Result<Value> {
        let chunking = self.ingestor.chunking();
        request.validate(
            self.ingestor.retrieval().max_limit,
            (chunking.chunk_size, chunking.overlap),
        )?;
        debug!(tool = request.name(), "dispatching tool request");

        let ingestor = &self.ingestor;
        match request {
            ToolRequest::AddDocument(doc) => Ok(to_json(&ingestor.add_document(doc).await?)),
            ToolRequest::AddDocumentWithChunks(args) => {
                let size = args.chunk_size.unwrap_or(chunking.chunk_size);
                let overlap = args.overlap.unwrap_or(chunking.overlap);
                let doc = ingestor
                    .add_document_with_chunks(args.document, size, overlap)
                    .await?;
                Ok(to_json(&doc))
            }
            ToolRequest::UpdateDocument(args) => Ok(to_json(
                &ingestor.update_document(&args.id, args.update).await?,
            )),
            ToolRequest::DeleteDocument(args) => {
                ingestor.delete_document(&args.id).await?;
                Ok(json!({ "deleted": args.id }))
            }
            ToolRequest::GetDocument(args) => Ok(to_json(&ingestor.get_document(&args.id).await?)),
            ToolRequest::Search(args) => {
                let query = args.into_query(ingestor.retrieval());
                let results = ingestor.search(&query).await?;
                Ok(json!({ "count": results.len(), "results": to_json(&results) }))
            }
            ToolRequest::TriggerIndexing => Ok(to_json(&self.indexer.trigger_indexing().await)),
            ToolRequest::IndexingStatus => Ok(to_json(&self.indexer.status())),
            ToolRequest::Stats => Ok(to_json(&ingestor.stats().await?)),
            ToolRequest::Health => Ok(to_json(&ingestor.health().await)),
        }
    }

    /// Handle one JSON request line and render the JSON response line.
    pub async fn handle_line(&self, line: &str) -> String {
        let outcome = match ToolRequest::parse(line) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => Err(e),
        };
        let response = match outcome {
            Ok(result) => json!({ "result": result }),
            Err(e) => to_json(&e.to_payload()),
        };
        response.to_string()
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, RetrievalConfig, SelfIndexConfig};
    use crate::embedding::{EmbeddingClient, HashProvider};
    use crate::retry::RetryPolicy;
    use context_indexer_core::store::memory::InMemoryStore;

    fn handler(root: &std::path::Path) -> ToolHandler {
        handler_with(root, RetrievalConfig::default())
    }

    fn handler_with(root: &std::path::Path, retrieval: RetrievalConfig) -> ToolHandler {
        let ingestor = Arc::new(Ingestor::new(
            Arc::new(InMemoryStore::new()),
            EmbeddingClient::new(Arc::new(HashProvider::new(32)), RetryPolicy::default()),
            ChunkingConfig::default(),
            retrieval,
        ));
        let indexer = SelfIndexer::new(
            ingestor.clone(),
            SelfIndexConfig {
                project_root: root.to_path_buf(),
                ..Default::default()
            },
        );
        ToolHandler::new(ingestor, indexer)
    }

    #[test]
    fn test_parse_variants() {
        let req = ToolRequest::parse(
            r#"{"tool": "add_document", "arguments": {"title": "T", "content": "body", "metadata": {"source": "api"}}}"#,
        )
        .unwrap();
        match req {
            ToolRequest::AddDocument(doc) => {
                assert_eq!(doc.title, "T");
                assert_eq!(doc.metadata.source, "api");
            }
            other => panic!("unexpected {other:?}"),
        }

        let req = ToolRequest::parse(r#"{"tool": "stats"}"#).unwrap();
        assert_eq!(req, ToolRequest::Stats);

        let req = ToolRequest::parse(
            r#"{"tool": "update_document", "arguments": {"id": "d1", "title": "New"}}"#,
        )
        .unwrap();
        assert_eq!(req.name(), "update_document");

        let req = ToolRequest::parse(
            r#"{"tool": "add_document_with_chunks", "arguments": {"content": "x", "chunk_size": 50}}"#,
        )
        .unwrap();
        match req {
            ToolRequest::AddDocumentWithChunks(args) => {
                assert_eq!(args.chunk_size, Some(50));
                assert_eq!(args.overlap, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tool_is_invalid_request() {
        let err = ToolRequest::parse(r#"{"tool": "drop_tables"}"#).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        let err = ToolRequest::parse("not json").unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn test_validation() {
        let defaults = (1000, 200);
        let search = |json: &str| {
            ToolRequest::parse(&format!(r#"{{"tool": "search", "arguments": {json}}}"#)).unwrap()
        };

        assert!(search(r#"{"query": "auth"}"#).validate(100, defaults).is_ok());
        assert_eq!(
            search(r#"{"query": "auth", "limit": 0}"#)
                .validate(100, defaults)
                .unwrap_err()
                .code(),
            "invalid_request"
        );
        assert!(search(r#"{"query": "auth", "limit": 101}"#)
            .validate(100, defaults)
            .is_err());
        assert!(search(r#"{"query": "auth", "similarity_threshold": 1.5}"#)
            .validate(100, defaults)
            .is_err());
        assert!(search(
            r#"{"query": "auth", "filters": {"date_range": {"from": "2024-02-01T00:00:00Z", "to": "2024-01-01T00:00:00Z"}}}"#
        )
        .validate(100, defaults)
        .is_err());
        assert_eq!(
            search(r#"{"query": "  "}"#).validate(100, defaults).unwrap_err(),
            Error::EmptyInput
        );

        let delete = ToolRequest::DeleteDocument(IdArgs { id: " ".into() });
        assert!(delete.validate(100, defaults).is_err());

        let update = ToolRequest::UpdateDocument(UpdateDocumentArgs {
            id: "d1".into(),
            update: DocumentUpdate::default(),
        });
        assert!(update.validate(100, defaults).is_err());

        let chunked = ToolRequest::AddDocumentWithChunks(ChunkedDocumentArgs {
            document: AddDocumentRequest {
                content: "text".into(),
                ..Default::default()
            },
            chunk_size: Some(100),
            overlap: None,
        });
        // Default overlap 200 is not smaller than 100.
        assert_eq!(
            chunked.validate(100, defaults).unwrap_err().code(),
            "invalid_request"
        );
    }

    #[tokio::test]
    async fn test_dispatch_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());

        let added: Value = serde_json::from_str(
            &handler
                .handle_line(
                    r#"{"tool": "add_document", "arguments": {"id": "doc-1", "title": "Retry policy", "content": "exponential backoff with jitter"}}"#,
                )
                .await,
        )
        .unwrap();
        assert_eq!(added["result"]["id"], "doc-1");
        assert_eq!(added["result"]["status"], "completed");

        let found: Value = serde_json::from_str(
            &handler
                .handle_line(
                    r#"{"tool": "search", "arguments": {"query": "exponential backoff with jitter", "similarity_threshold": 0.9}}"#,
                )
                .await,
        )
        .unwrap();
        assert_eq!(found["result"]["count"], 1);
        assert_eq!(found["result"]["results"][0]["score_kind"], "semantic");

        let stats: Value =
            serde_json::from_str(&handler.handle_line(r#"{"tool": "stats"}"#).await).unwrap();
        assert_eq!(stats["result"]["count"], 1);

        let deleted: Value = serde_json::from_str(
            &handler
                .handle_line(r#"{"tool": "delete_document", "arguments": {"id": "doc-1"}}"#)
                .await,
        )
        .unwrap();
        assert_eq!(deleted["result"]["deleted"], "doc-1");

        let missing: Value = serde_json::from_str(
            &handler
                .handle_line(r#"{"tool": "get_document", "arguments": {"id": "doc-1"}}"#)
                .await,
        )
        .unwrap();
        assert_eq!(missing["error"]["code"], "document_not_found");
    }

    #[tokio::test]
    async fn test_indexing_tools() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Hello").unwrap();
        let handler = handler(dir.path());

        let status: Value = serde_json::from_str(
            &handler.handle_line(r#"{"tool": "indexing_status"}"#).await,
        )
        .unwrap();
        assert_eq!(status["result"]["is_indexing"], false);
        assert!(status["result"]["last_indexed_at"].is_null());

        let triggered: Value = serde_json::from_str(
            &handler.handle_line(r#"{"tool": "trigger_indexing"}"#).await,
        )
        .unwrap();
        assert_eq!(triggered["result"]["outcome"], "completed");
        assert_eq!(
            triggered["result"]["report"]["sweeps"][0]["sweep"],
            "documentation"
        );
        assert_eq!(triggered["result"]["report"]["sweeps"][0]["indexed"], 1);

        let empty: Value = serde_json::from_str(
            &handler
                .handle_line(r#"{"tool": "add_document", "arguments": {"content": ""}}"#)
                .await,
        )
        .unwrap();
        assert_eq!(empty["error"]["code"], "empty_input");
    }

    #[tokio::test]
    async fn test_search_defaults_come_from_retrieval_config() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_with(
            dir.path(),
            RetrievalConfig {
                similarity_threshold: 0.0,
                default_limit: 3,
                max_limit: 5,
            },
        );
        for (i, content) in ["alpha beta gamma", "red green", "north south", "up down"]
            .iter()
            .enumerate()
        {
            handler
                .handle_line(&format!(
                    r#"{{"tool": "add_document", "arguments": {{"id": "d{i}", "content": "{content}"}}}}"#
                ))
                .await;
        }

        let found: Value = serde_json::from_str(
            &handler
                .handle_line(r#"{"tool": "search", "arguments": {"query": "alpha delta epsilon zeta"}}"#)
                .await,
        )
        .unwrap();
        assert_eq!(found["result"]["count"], 3, "{found}");

        let capped: Value = serde_json::from_str(
            &handler
                .handle_line(r#"{"tool": "search", "arguments": {"query": "anything", "limit": 6}}"#)
                .await,
        )
        .unwrap();
        assert_eq!(capped["error"]["code"], "invalid_request");

        let explicit: Value = serde_json::from_str(
            &handler
                .handle_line(
                    r#"{"tool": "search", "arguments": {"query": "alpha beta gamma", "limit": 5, "similarity_threshold": 0.99}}"#,
                )
                .await,
        )
        .unwrap();
        assert_eq!(explicit["result"]["count"], 1);
    }
}

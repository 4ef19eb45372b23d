//! Wiring: builds the orchestrator, scheduler, and tool handler from a
//! [`Config`].

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use context_indexer_core::store::memory::InMemoryStore;
use context_indexer_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::ingest::Ingestor;
use crate::scheduler::SelfIndexer;
use crate::tools::ToolHandler;

pub struct Pipeline {
    pub ingestor: Arc<Ingestor>,
    pub indexer: SelfIndexer,
}

impl Pipeline {
    /// Validate `config` and wire everything to a fresh in-memory store.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(config: &Config, store: Arc<dyn VectorStore>) -> Result<Self> {
        config.validate()?;
        let embedder = EmbeddingClient::from_config(&config.embedding)?;
        debug!(
            provider = embedder.provider_name(),
            model = embedder.model_name(),
            dims = embedder.dims(),
            "embedding client ready"
        );
        let ingestor = Arc::new(Ingestor::new(
            store,
            embedder,
            config.chunking.clone(),
            config.retrieval.clone(),
        ));
        let indexer = SelfIndexer::new(ingestor.clone(), config.self_index.clone());
        Ok(Self { ingestor, indexer })
    }

    pub fn tool_handler(&self) -> ToolHandler {
        ToolHandler::new(self.ingestor.clone(), self.indexer.clone())
    }
}

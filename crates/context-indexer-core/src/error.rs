//! Error taxonomy shared by the chunker, embedding client, orchestrator,
//! and request boundary.
//!
//! Every variant maps to a stable snake_case [`code`](Error::code) that
//! callers can match on without parsing messages:
//!
//! ```json
//! { "error": { "code": "document_not_found", "message": "document not found: 42" } }
//! ```

use serde::Serialize;
use thiserror::Error;

/// Result alias used across the indexer.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed failures surfaced to ingestion and search callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Caller-supplied text was blank after normalization.
    #[error("input text is empty after normalization")]
    EmptyInput,

    /// Every entry of a batch was blank after normalization.
    #[error("no valid input: every text in the batch was empty after normalization")]
    NoValidInput,

    /// The embedding provider kept failing until the retry budget ran out.
    #[error("embedding generation failed after {attempts} attempt(s): {message}")]
    EmbeddingGenerationFailed { attempts: u32, message: String },

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("document addition failed: {0}")]
    DocumentAdditionFailed(String),

    #[error("document update failed: {0}")]
    DocumentUpdateFailed(String),

    #[error("document deletion failed: {0}")]
    DocumentDeletionFailed(String),

    #[error("document search failed: {0}")]
    DocumentSearchFailed(String),

    /// Settings that can never work, e.g. an overlap that is not smaller
    /// than the chunk size.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A tool request failed boundary validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Error::EmptyInput => "empty_input",
            Error::NoValidInput => "no_valid_input",
            Error::EmbeddingGenerationFailed { .. } => "embedding_generation_failed",
            Error::DocumentNotFound(_) => "document_not_found",
            Error::DocumentAdditionFailed(_) => "document_addition_failed",
            Error::DocumentUpdateFailed(_) => "document_update_failed",
            Error::DocumentDeletionFailed(_) => "document_deletion_failed",
            Error::DocumentSearchFailed(_) => "document_search_failed",
            Error::InvalidConfiguration(_) => "invalid_configuration",
            Error::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Wire representation used by the CLI and the tool request loop.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        }
    }
}

/// `{ "error": { "code": ..., "message": ... } }`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

//! # Context Indexer Core
//!
//! Shared, I/O-free logic for Context Indexer: data models, the error
//! taxonomy, sliding-window chunking, relevance scoring, the embedding
//! provider trait, and the vector-store abstraction.
//!
//! This crate contains no tokio, filesystem, or network dependencies.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod scoring;
pub mod store;

pub use error::{Error, Result};

//! # Context Indexer
//!
//! Keeps a vector store populated with a project's own documentation, code,
//! recent history and layout, and answers semantic searches over it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐   ┌─────────────┐
//! │  Scheduler   │──▶│   Sweeps     │──▶│   Ingestor     │──▶│ VectorStore │
//! │ single-flight│   │ docs/code/   │   │ chunk + embed  │   │ (trait)     │
//! │ timer        │   │ git/tree     │   │ (retrying)     │   │             │
//! └──────────────┘   └──────────────┘   └───────┬────────┘   └─────────────┘
//!                                               ▲
//!                     ┌──────────────┐          │
//!                     │ Tool requests│──────────┘
//!                     │ (JSON lines) │
//!                     └──────────────┘
//! ```
//!
//! Chunking, scoring, the data model and the store trait live in
//! `context-indexer-core`; this crate adds configuration, providers, the
//! orchestrator, the scheduler and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`retry`] | Bounded exponential-backoff combinator |
//! | [`embedding`] | Embedding providers and the retrying client |
//! | [`ingest`] | Ingestion orchestrator |
//! | [`sweep`], [`sweep_fs`], [`sweep_git`], [`sweep_tree`] | Self-indexing sweeps |
//! | [`scheduler`] | Periodic single-flight self-indexer |
//! | [`tools`] | Validated tool requests and dispatch |
//! | [`pipeline`] | Wiring from a [`config::Config`] |

pub mod config;
pub mod embedding;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod sweep;
pub mod sweep_fs;
pub mod sweep_git;
pub mod sweep_tree;
pub mod tools;

//! # Context Indexer CLI (`ctx-index`)
//!
//! ## Usage
//!
//! ```bash
//! ctx-index [--config ./ctx-index.toml] [--root <dir>] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctx-index index` | Run one self-indexing pass and print the report |
//! | `ctx-index search "<query>"` | Index the project, then search it |
//! | `ctx-index chunk <file>` | Print the chunk layout of a file |
//! | `ctx-index health` | Embedding connectivity and store checks |
//! | `ctx-index serve` | Run the scheduler and answer JSON-line tool requests on stdin |
//!
//! ## Examples
//!
//! ```bash
//! # One pass over the current project with the default config
//! ctx-index index
//!
//! # Search with a stricter threshold
//! ctx-index search "retry policy" --threshold 0.8 --limit 5
//!
//! # Inspect how a file would be chunked
//! ctx-index chunk README.md --size 500 --overlap 50
//!
//! # Drive the tool boundary by hand
//! echo '{"tool": "indexing_status"}' | ctx-index serve
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use context_indexer::config::{self, Config};
use context_indexer::logging;
use context_indexer::pipeline::Pipeline;
use context_indexer::scheduler::{PassReport, TriggerOutcome};
use context_indexer_core::chunk::chunk_text;

/// Context Indexer CLI: self-indexing ingestion and semantic search over a
/// project.
#[derive(Parser)]
#[command(
    name = "ctx-index",
    about = "Context Indexer: chunk, embed, and search a project's own documentation, code, and history",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `self_index.project_root`.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one self-indexing pass and print the per-sweep report.
    Index,

    /// Index the project into a fresh store, then search it.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum similarity score in [0, 1].
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Print how a file would be chunked.
    Chunk {
        file: PathBuf,

        /// Chunk size in characters (defaults to `chunking.chunk_size`).
        #[arg(long)]
        size: Option<usize>,

        /// Overlap in characters (defaults to `chunking.overlap`).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Check embedding connectivity and the store.
    Health,

    /// Start the scheduler and answer tool requests, one JSON object per
    /// line on stdin, until EOF.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    if let Some(root) = cli.root {
        cfg.self_index.project_root = root;
    }
    logging::init_with_config(&cfg.logging);

    match cli.command {
        Commands::Index => {
            let pipeline = Pipeline::from_config(&cfg)?;
            let report = run_pass(&pipeline).await?;
            print_report(&report);
        }
        Commands::Search {
            query,
            limit,
            threshold,
        } => {
            let pipeline = Pipeline::from_config(&cfg)?;
            run_pass(&pipeline).await?;

            let mut query = cfg.retrieval.query(query);
            if let Some(limit) = limit {
                query = query.with_limit(limit);
            }
            if let Some(threshold) = threshold {
                query = query.with_threshold(threshold);
            }
            let results = pipeline.ingestor.search(&query).await?;

            if results.is_empty() {
                println!("No results.");
            }
            for (i, result) in results.iter().enumerate() {
                let doc = &result.document;
                let kind = serde_json::to_value(result.score_kind)?;
                println!(
                    "{}. [{:.2} {}] {}",
                    i + 1,
                    result.score,
                    kind.as_str().unwrap_or("unknown"),
                    doc.title
                );
                println!(
                    "   type: {}  source: {}  id: {}",
                    doc.metadata.content_type, doc.metadata.source, doc.id
                );
            }
        }
        Commands::Chunk {
            file,
            size,
            overlap,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let size = size.unwrap_or(cfg.chunking.chunk_size);
            let overlap = overlap.unwrap_or(cfg.chunking.overlap);
            let spans = chunk_text(&content, size, overlap)?;

            println!(
                "{}: {} chars, {} chunks (size {}, overlap {})",
                file.display(),
                content.chars().count(),
                spans.len(),
                size,
                overlap
            );
            for span in &spans {
                println!(
                    "  #{:<3} [{}..{})  ~{} tokens  overlap prev={} next={}",
                    span.index,
                    span.start_position,
                    span.end_position,
                    span.token_count,
                    span.overlap_with_previous,
                    span.overlap_with_next
                );
            }
        }
        Commands::Health => {
            let pipeline = Pipeline::from_config(&cfg)?;
            let health = pipeline.ingestor.health().await;
            println!("store:     {}", if health.store { "ok" } else { "unreachable" });
            let embedding = match health.embedding {
                Some(true) => "ok",
                Some(false) => "failed",
                None => "disabled",
            };
            println!("embedding: {} ({})", embedding, health.embedding_provider);
            if !health.healthy {
                bail!("health check failed");
            }
        }
        Commands::Serve => {
            let pipeline = Pipeline::from_config(&cfg)?;
            let handler = pipeline.tool_handler();
            pipeline.indexer.start();

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut stdout = tokio::io::stdout();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                let response = handler.handle_line(&line).await;
                stdout.write_all(response.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }

            pipeline.indexer.stop().await;
        }
    }

    Ok(())
}

async fn run_pass(pipeline: &Pipeline) -> Result<PassReport> {
    match pipeline.indexer.trigger_indexing().await {
        TriggerOutcome::Completed { report } => Ok(report),
        TriggerOutcome::AlreadyRunning => bail!("an indexing pass is already running"),
    }
}

fn print_report(report: &PassReport) {
    println!(
        "Indexing pass finished in {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );
    for sweep in &report.sweeps {
        print!(
            "  {:<18} indexed {:>4}  skipped {:>4}  failed {:>4}",
            sweep.sweep, sweep.indexed, sweep.skipped, sweep.failed
        );
        match &sweep.error {
            Some(err) => println!("  error: {err}"),
            None => println!(),
        }
    }
    println!(
        "Total: {} indexed, {} failed",
        report.indexed(),
        report.failed()
    );
}

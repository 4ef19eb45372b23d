//! TOML configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable [`Config`]. [`load_config`] parses and validates; [`Config::validate`]
//! can be used on configs built in code.
//!
//! ```toml
//! [chunking]
//! chunk_size = 1000
//! overlap = 200
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [self_index]
//! enabled = true
//! interval_ms = 300000
//! project_root = "."
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use context_indexer_core::chunk;
use context_indexer_core::models::SearchQuery;
use context_indexer_core::Error;

use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub self_index: SelfIndexConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Provider endpoint; each provider has its own default.
    #[serde(default)]
    pub url: Option<String>,
    /// Credentials; the OpenAI provider falls back to `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key: None,
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_input_chars() -> usize {
    32_000
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl RetrievalConfig {
    /// A query for `text` carrying the configured limit and threshold.
    pub fn query(&self, text: impl Into<String>) -> SearchQuery {
        SearchQuery::new(text)
            .with_limit(self.default_limit)
            .with_threshold(self.similarity_threshold)
    }
}

fn default_similarity_threshold() -> f64 {
    context_indexer_core::models::DEFAULT_SIMILARITY_THRESHOLD
}
fn default_limit() -> usize {
    context_indexer_core::models::DEFAULT_SEARCH_LIMIT
}
fn default_max_limit() -> usize {
    context_indexer_core::models::MAX_SEARCH_LIMIT
}

/// Settings for the self-indexing scheduler and its sweeps.
#[derive(Debug, Deserialize, Clone)]
pub struct SelfIndexConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// Documentation directory, relative to `project_root`.
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    /// Source directory, relative to `project_root`.
    #[serde(default = "default_src_dir")]
    pub src_dir: PathBuf,
    /// Top-level documentation files indexed by the documentation sweep.
    #[serde(default = "default_doc_files")]
    pub doc_files: Vec<String>,
    #[serde(default = "default_doc_extensions")]
    pub doc_extensions: Vec<String>,
    #[serde(default = "default_code_extensions")]
    pub code_extensions: Vec<String>,
    /// Top-level configuration files indexed by the code sweep.
    #[serde(default = "default_config_files")]
    pub config_files: Vec<String>,
    /// Directory names skipped at every level of every traversal.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Extra glob patterns (relative to `project_root`) excluded from sweeps.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_history_days")]
    pub history_days: u32,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_structure_max_depth")]
    pub structure_max_depth: usize,
}

impl Default for SelfIndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_interval_ms(),
            project_root: default_project_root(),
            docs_dir: default_docs_dir(),
            src_dir: default_src_dir(),
            doc_files: default_doc_files(),
            doc_extensions: default_doc_extensions(),
            code_extensions: default_code_extensions(),
            config_files: default_config_files(),
            exclude_dirs: default_exclude_dirs(),
            exclude_globs: Vec::new(),
            history_days: default_history_days(),
            max_file_bytes: default_max_file_bytes(),
            structure_max_depth: default_structure_max_depth(),
        }
    }
}

impl SelfIndexConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_true() -> bool {
    true
}
fn default_interval_ms() -> u64 {
    300_000
}
fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}
fn default_src_dir() -> PathBuf {
    PathBuf::from("src")
}
fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
fn default_doc_files() -> Vec<String> {
    strings(&["README.md", "CHANGELOG.md", "CONTRIBUTING.md"])
}
fn default_doc_extensions() -> Vec<String> {
    strings(&["md", "mdx", "txt", "rst", "adoc"])
}
fn default_code_extensions() -> Vec<String> {
    strings(&[
        "rs", "ts", "tsx", "js", "jsx", "py", "go", "java", "kt", "c", "h", "cpp", "hpp", "cs",
        "rb", "php", "swift", "sh", "sql",
    ])
}
fn default_config_files() -> Vec<String> {
    strings(&[
        "Cargo.toml",
        "package.json",
        "tsconfig.json",
        "pyproject.toml",
        "go.mod",
        "Dockerfile",
        "docker-compose.yml",
        "Makefile",
        ".env.example",
    ])
}
fn default_exclude_dirs() -> Vec<String> {
    strings(&[
        "node_modules",
        ".git",
        "target",
        "dist",
        "build",
        "out",
        "coverage",
        ".next",
        ".cache",
        "__pycache__",
        ".venv",
        "vendor",
    ])
}
fn default_history_days() -> u32 {
    7
}
fn default_max_file_bytes() -> u64 {
    1024 * 1024
}
fn default_structure_max_depth() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Reject settings that can never work.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        chunk::validate_params(self.chunking.chunk_size, self.chunking.overlap)?;

        let retrieval = &self.retrieval;
        if !(0.0..=1.0).contains(&retrieval.similarity_threshold) {
            return Err(Error::InvalidConfiguration(
                "retrieval.similarity_threshold must be in [0.0, 1.0]".to_string(),
            ));
        }
        if retrieval.max_limit == 0 || !(1..=retrieval.max_limit).contains(&retrieval.default_limit)
        {
            return Err(Error::InvalidConfiguration(format!(
                "retrieval.default_limit must be in 1..={}",
                retrieval.max_limit
            )));
        }

        if self.self_index.interval_ms == 0 {
            return Err(Error::InvalidConfiguration(
                "self_index.interval_ms must be > 0".to_string(),
            ));
        }

        let embedding = &self.embedding;
        match embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "hash" => {}
            other => {
                return Err(Error::InvalidConfiguration(format!(
                    "unknown embedding provider: '{other}'. Must be disabled, openai, ollama, or hash."
                )))
            }
        }
        if embedding.is_enabled() {
            if embedding.dims.unwrap_or(0) == 0 {
                return Err(Error::InvalidConfiguration(format!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    embedding.provider
                )));
            }
            if embedding.provider != "hash" && embedding.model.is_none() {
                return Err(Error::InvalidConfiguration(format!(
                    "embedding.model must be specified when provider is '{}'",
                    embedding.provider
                )));
            }
        }
        if embedding.max_input_chars == 0 {
            return Err(Error::InvalidConfiguration(
                "embedding.max_input_chars must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.embedding.max_retries, 3);
        assert_eq!(config.self_index.history_days, 7);
        assert!(config.self_index.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let config: Config = toml::from_str("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "invalid_configuration");
    }

    #[test]
    fn test_enabled_provider_needs_dims_and_model() {
        let config: Config = toml::from_str("[embedding]\nprovider = \"openai\"\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config =
            toml::from_str("[embedding]\nprovider = \"hash\"\ndims = 64\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config: Config = toml::from_str("[embedding]\nprovider = \"magic\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_range() {
        let config: Config =
            toml::from_str("[retrieval]\nsimilarity_threshold = 1.5\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config: Config = toml::from_str(
            "[embedding]\nmax_retries = 0\nbase_delay_ms = 5\nmax_delay_ms = 50\n",
        )
        .unwrap();
        let policy = config.embedding.retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(5));
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.toml");
        std::fs::write(&path, "[self_index]\ninterval_ms = 1000\nproject_root = \"/tmp/p\"\n")
            .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.self_index.interval_ms, 1000);
        assert_eq!(config.self_index.project_root, PathBuf::from("/tmp/p"));
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}

//! Embedding providers and the retrying embedding client.
//!
//! Concrete [`EmbeddingProvider`] implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`HashProvider`]**: deterministic feature hashing; no network.
//!
//! Providers make exactly one attempt per call. [`EmbeddingClient`] layers
//! the behavior callers rely on: text normalization, blank-input rejection,
//! bounded exponential backoff via [`with_retry`], batch semantics, and
//! dimension checks.
//!
//! # Provider Selection
//!
//! ```rust
//! # use context_indexer::config::EmbeddingConfig;
//! # use context_indexer::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

mod hash;
mod ollama;
mod openai;

pub use hash::HashProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

use anyhow::bail;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use context_indexer_core::embedding::{normalize_text, truncate_chars, EmbeddingProvider};
use context_indexer_core::{Error, Result};

use crate::config::EmbeddingConfig;
use crate::retry::{with_retry, RetryExhausted, RetryPolicy};

/// Fixed text embedded by [`EmbeddingClient::test_connection`].
const CONNECTION_PROBE: &str = "connection test";

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
    async fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"hash"` | [`HashProvider`] (`dims` defaults to 384) |
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        "hash" => Ok(Arc::new(HashProvider::new(config.dims.unwrap_or(384)))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Client ============

/// Resilient front door to an [`EmbeddingProvider`].
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    max_input_chars: usize,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            retry,
            max_input_chars: 32_000,
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars.max(1);
        self
    }

    /// Build the configured provider wrapped in the configured retry policy.
    pub fn from_config(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let provider = create_provider(config)?;
        Ok(Self::new(provider, config.retry_policy()).with_max_input_chars(config.max_input_chars))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dims(&self) -> usize {
        self.provider.dims()
    }

    /// `false` only for [`DisabledProvider`].
    pub fn is_enabled(&self) -> bool {
        self.provider.name() != "disabled"
    }

    /// Normalize and truncate; `None` when nothing meaningful remains.
    fn prepare(&self, text: &str) -> Option<String> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            None
        } else {
            Some(truncate_chars(&normalized, self.max_input_chars).to_string())
        }
    }

    fn check_dims(&self, vector: &[f32], attempts: u32) -> Result<()> {
        if vector.len() != self.dims() {
            return Err(Error::EmbeddingGenerationFailed {
                attempts,
                message: format!(
                    "provider '{}' returned {} dimensions, expected {}",
                    self.provider_name(),
                    vector.len(),
                    self.dims()
                ),
            });
        }
        Ok(())
    }

    /// Embed one text.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] if the text is blank after normalization
    ///   (the provider is never called).
    /// - [`Error::EmbeddingGenerationFailed`] once the retry budget is spent
    ///   or the vector has the wrong dimensionality.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = self.prepare(text).ok_or(Error::EmptyInput)?;
        let provider = self.provider.as_ref();
        let input = input.as_str();
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let vector = with_retry(&self.retry, "embed", move || {
            counter.fetch_add(1, Ordering::Relaxed);
            provider.embed(input)
        })
        .await
        .map_err(exhausted)?;
        self.check_dims(&vector, attempts.into_inner())?;
        Ok(vector)
    }

    /// Embed many texts, preserving order and dropping blank entries.
    ///
    /// An empty slice yields an empty result; a single-element slice takes
    /// the [`embed`](Self::embed) path.
    ///
    /// # Errors
    ///
    /// - [`Error::NoValidInput`] if every entry is blank after normalization.
    /// - [`Error::EmbeddingGenerationFailed`] as for [`embed`](Self::embed).
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() == 1 {
            return Ok(vec![self.embed(&texts[0]).await?]);
        }
        Ok(self
            .embed_batch_aligned(texts)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Like [`embed_batch`](Self::embed_batch) but keeps one slot per input:
    /// blank entries come back as `None` instead of being dropped.
    pub async fn embed_batch_aligned(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared: Vec<Option<String>> = texts.iter().map(|t| self.prepare(t)).collect();
        let inputs: Vec<String> = prepared.iter().flatten().cloned().collect();
        if inputs.is_empty() {
            return Err(Error::NoValidInput);
        }
        let dropped = texts.len() - inputs.len();
        if dropped > 0 {
            debug!(dropped, total = texts.len(), "dropping blank batch entries");
        }

        let provider = self.provider.as_ref();
        let batch = inputs.as_slice();
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let vectors = with_retry(&self.retry, "embed_batch", move || {
            counter.fetch_add(1, Ordering::Relaxed);
            provider.embed_batch(batch)
        })
        .await
        .map_err(exhausted)?;
        let attempts = attempts.into_inner();

        if vectors.len() != inputs.len() {
            return Err(Error::EmbeddingGenerationFailed {
                attempts,
                message: format!(
                    "provider returned {} vectors for {} inputs",
                    vectors.len(),
                    inputs.len()
                ),
            });
        }
        for vector in &vectors {
            self.check_dims(vector, attempts)?;
        }

        let mut vectors = vectors.into_iter();
        Ok(prepared
            .iter()
            .map(|p| p.as_ref().and_then(|_| vectors.next()))
            .collect())
    }

    /// Embed a fixed probe string. Never fails; reports success as a bool.
    pub async fn test_connection(&self) -> bool {
        match self.embed(CONNECTION_PROBE).await {
            Ok(_) => {
                info!(provider = self.provider_name(), "embedding connection ok");
                true
            }
            Err(e) => {
                warn!(provider = self.provider_name(), error = %e, "embedding connection failed");
                false
            }
        }
    }
}

fn exhausted(err: RetryExhausted<anyhow::Error>) -> Error {
    Error::EmbeddingGenerationFailed {
        attempts: err.attempts,
        message: format!("{:#}", err.last_error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Fails the first `failures` calls, then delegates to a hash provider.
    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
        inner: HashProvider,
    }

    impl FlakyProvider {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                inner: HashProvider::new(8),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }
        fn model_name(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            8
        }
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                bail!("transient failure");
            }
            self.inner.embed(text).await
        }
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                bail!("transient failure");
            }
            self.inner.embed_batch(texts).await
        }
    }

    /// Claims 4 dimensions but returns 8.
    struct LyingProvider(HashProvider);

    #[async_trait]
    impl EmbeddingProvider for LyingProvider {
        fn name(&self) -> &str {
            "lying"
        }
        fn model_name(&self) -> &str {
            "lying"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.0.embed(text).await
        }
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.0.embed_batch(texts).await
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn client_for(provider: Arc<FlakyProvider>) -> EmbeddingClient {
        EmbeddingClient::new(provider, fast_policy())
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_provider() {
        let provider = Arc::new(FlakyProvider::new(0));
        let client = client_for(provider.clone());
        for blank in ["", "   ", "\n\t  \u{200B}"] {
            assert_eq!(client.embed(blank).await.unwrap_err(), Error::EmptyInput);
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let provider = Arc::new(FlakyProvider::new(2));
        let client = client_for(provider.clone());
        let vector = client.embed("hello").await.unwrap();
        assert_eq!(vector.len(), 8);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_tagged() {
        let provider = Arc::new(FlakyProvider::new(10));
        let client = client_for(provider.clone());
        let err = client.embed("hello").await.unwrap_err();
        assert_eq!(err.code(), "embedding_generation_failed");
        assert!(matches!(err, Error::EmbeddingGenerationFailed { attempts: 3, .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_batch_drops_blank_entries() {
        let client = client_for(Arc::new(FlakyProvider::new(0)));
        let texts = vec!["valid".to_string(), "".to_string(), "also valid".to_string()];
        let vectors = client.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);

        let aligned = client.embed_batch_aligned(&texts).await.unwrap();
        assert_eq!(aligned.len(), 3);
        assert!(aligned[1].is_none());
        assert_eq!(aligned[0].as_ref(), Some(&vectors[0]));
        assert_eq!(aligned[2].as_ref(), Some(&vectors[1]));
    }

    #[tokio::test]
    async fn test_batch_edge_cases() {
        let provider = Arc::new(FlakyProvider::new(0));
        let client = client_for(provider.clone());
        assert!(client.embed_batch(&[]).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let blanks = vec![" ".to_string(), "\n".to_string()];
        assert_eq!(
            client.embed_batch(&blanks).await.unwrap_err(),
            Error::NoValidInput
        );

        let single = vec!["   ".to_string()];
        assert_eq!(
            client.embed_batch(&single).await.unwrap_err(),
            Error::EmptyInput
        );
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let client = EmbeddingClient::new(Arc::new(LyingProvider(HashProvider::new(8))), fast_policy());
        let err = client.embed("text").await.unwrap_err();
        assert_eq!(err.code(), "embedding_generation_failed");
    }

    /// Fails once, then answers every batch with a single vector.
    struct ShortBatchProvider {
        calls: AtomicU32,
        inner: HashProvider,
    }

    #[async_trait]
    impl EmbeddingProvider for ShortBatchProvider {
        fn name(&self) -> &str {
            "short"
        }
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            8
        }
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.inner.embed(text).await
        }
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                bail!("transient failure");
            }
            self.inner.embed_batch(&texts[..1]).await
        }
    }

    #[tokio::test]
    async fn test_malformed_batch_reports_attempts_used() {
        let client = EmbeddingClient::new(
            Arc::new(ShortBatchProvider {
                calls: AtomicU32::new(0),
                inner: HashProvider::new(8),
            }),
            fast_policy(),
        );
        let texts = vec!["one".to_string(), "two".to_string()];
        let err = client.embed_batch(&texts).await.unwrap_err();
        assert!(
            matches!(err, Error::EmbeddingGenerationFailed { attempts: 2, .. }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_connection_probe_never_errors() {
        let ok = EmbeddingClient::new(Arc::new(HashProvider::new(8)), fast_policy());
        assert!(ok.test_connection().await);

        let disabled = EmbeddingClient::new(Arc::new(DisabledProvider), fast_policy());
        assert!(!disabled.test_connection().await);
    }

    #[test]
    fn test_create_provider() {
        let mut config = EmbeddingConfig {
            provider: "hash".to_string(),
            dims: Some(32),
            ..Default::default()
        };
        assert_eq!(create_provider(&config).unwrap().dims(), 32);
        config.provider = "nope".to_string();
        assert!(create_provider(&config).is_err());
    }
}

//! Deterministic feature-hashing embedder.
//!
//! Each lower-cased alphanumeric token is hashed with SHA-256; the digest
//! picks a bucket and a sign, and the resulting vector is L2-normalized.
//! Texts sharing vocabulary land close together, identical texts produce
//! identical vectors, and nothing leaves the process. Intended for tests
//! and offline runs, not as a substitute for a trained model.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use context_indexer_core::embedding::EmbeddingProvider;

pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dims;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn name(&self) -> &str {
        "hash"
    }
    fn model_name(&self) -> &str {
        "feature-hash-sha256"
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

//! Offline feature-hashing embedder.
//!
//! [`HashingEmbeddingProvider`] maps each lower-cased alphanumeric token to a
//! bucket with FNV-1a and L2-normalises the resulting term-count vector. It
//! needs no model download or API key, which makes it the default for local
//! corpora and for tests. Similarity is purely lexical.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Default number of hash buckets.
pub const DEFAULT_HASHING_DIMENSIONS: usize = 512;

/// Prefix of every hashing model id; the dimension follows after a `/`.
pub const HASHING_MODEL_PREFIX: &str = "hashing-fnv1a-v1";

/// A deterministic bag-of-words embedder based on the hashing trick.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbeddingProvider {
    /// Create a provider with `dimensions` buckets.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigError("embedding dimensions must be greater than zero".into()));
        }
        Ok(Self { dimensions, model_id: format!("{HASHING_MODEL_PREFIX}/{dimensions}") })
    }

    /// Recreate the provider that reported `model_id`, if it is a hashing one.
    pub fn from_model_id(model_id: &str) -> Option<Self> {
        let dimensions = model_id.strip_prefix(HASHING_MODEL_PREFIX)?.strip_prefix('/')?;
        Self::new(dimensions.parse().ok()?).ok()
    }

    /// Compute the embedding synchronously.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_HASHING_DIMENSIONS,
            model_id: format!("{HASHING_MODEL_PREFIX}/{DEFAULT_HASHING_DIMENSIONS}"),
        }
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

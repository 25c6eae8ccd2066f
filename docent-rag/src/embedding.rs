//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. Output must be deterministic for identical input within one
/// model version. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docent_rag::EmbeddingProvider;
///
/// let provider = HashingEmbeddingProvider::new(256);
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Stable identifier of the model (and version) producing the vectors.
    ///
    /// Recorded in every index so that an index is never queried with vectors
    /// from a different model.
    fn model_id(&self) -> &str;

    /// Identity of this provider as recorded in an index.
    fn info(&self) -> EmbedderInfo {
        EmbedderInfo { model_id: self.model_id().to_string(), dimensions: self.dimensions() }
    }
}

/// The identity of the embedder an index was built with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedderInfo {
    /// Model identifier reported by [`EmbeddingProvider::model_id`].
    pub model_id: String,
    /// Vector dimension reported by [`EmbeddingProvider::dimensions`].
    pub dimensions: usize,
}

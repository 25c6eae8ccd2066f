//! Query-time retrieval over a [`SharedIndex`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{SharedIndex, VectorIndex};

/// Embeds a query with the index's own embedder and returns the top-k chunks.
///
/// The embedder is pinned to the index: construction fails if it does not
/// match, and every query re-checks against the current snapshot so a rebuild
/// with another model is caught instead of silently producing bad scores.
pub struct Retriever {
    index: Arc<SharedIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    similarity_threshold: Option<f32>,
    embed_timeout: Duration,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.model_id())
            .field("top_k", &self.top_k)
            .field("similarity_threshold", &self.similarity_threshold)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Create a retriever over `index` using `embedder` for queries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] or [`RagError::EmbedderMismatch`]
    /// if `embedder` is not the one the index was built with, and
    /// [`RagError::ConfigError`] if `config` fails [`RagConfig::validate`].
    pub fn new(
        index: Arc<SharedIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RagConfig,
    ) -> Result<Self> {
        config.validate()?;
        index.snapshot().check_embedder(embedder.as_ref())?;
        Ok(Self {
            index,
            embedder,
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
            embed_timeout: config.embed_timeout,
        })
    }

    /// Convenience constructor wrapping a plain [`VectorIndex`].
    pub fn from_index(
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RagConfig,
    ) -> Result<Self> {
        Self::new(Arc::new(SharedIndex::new(index)), embedder, config)
    }

    /// The configured default number of results.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The shared index this retriever reads from.
    pub fn index(&self) -> &Arc<SharedIndex> {
        &self.index
    }

    /// Retrieve the `k` chunks most similar to `query`, best first.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k == 0`
    /// - [`RagError::EmbeddingError`] if the embedder fails or times out
    /// - [`RagError::DimensionMismatch`] / [`RagError::EmbedderMismatch`] if the
    ///   index was rebuilt with a different embedder
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be at least 1".to_string()));
        }

        let snapshot = self.index.snapshot();
        snapshot.check_embedder(self.embedder.as_ref())?;

        let query_embedding = tokio::time::timeout(self.embed_timeout, self.embedder.embed(query))
            .await
            .map_err(|_| {
                error!(timeout = ?self.embed_timeout, "query embedding timed out");
                RagError::EmbeddingError {
                    provider: self.embedder.model_id().to_string(),
                    message: format!("timed out after {:?}", self.embed_timeout),
                }
            })?
            .map_err(|e| {
                error!(error = %e, "embedding failed during query");
                e
            })?;

        let mut results = snapshot.query(&query_embedding, k)?;
        if let Some(threshold) = self.similarity_threshold {
            results.retain(|r| r.score >= threshold);
        }

        debug!(k, result_count = results.len(), "retrieval completed");
        Ok(results)
    }

    /// Retrieve with the configured default `top_k`.
    pub async fn retrieve_default(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retrieve(query, self.top_k).await
    }
}

//! Build-time ingestion pipeline.
//!
//! The [`IndexPipeline`] composes a [`Chunker`] and an [`EmbeddingProvider`]
//! into the documents → chunks → vectors → [`VectorIndex`] workflow, and hands
//! out [`Retriever`]s pinned to the same embedder.
//!
//! # Example
//!
//! ```rust,ignore
//! use docent_rag::{HashingEmbeddingProvider, IndexPipeline, RagConfig, RecursiveChunker};
//!
//! let pipeline = IndexPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .build()?;
//!
//! let index = pipeline.build_index(&documents).await?;
//! index.persist("corpus.index.json")?;
//! let retriever = pipeline.retriever(index)?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::retriever::Retriever;

/// Chunks, embeds and indexes a corpus.
///
/// Construct one via [`IndexPipeline::builder()`].
pub struct IndexPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
}

impl IndexPipeline {
    /// Create a new [`IndexPipelineBuilder`].
    pub fn builder() -> IndexPipelineBuilder {
        IndexPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Split every document into chunks.
    ///
    /// Blank documents contribute no chunks.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            let document_chunks = self.chunker.chunk(document);
            if document_chunks.is_empty() {
                info!(document.id = %document.id, "skipped blank document");
                continue;
            }
            info!(document.id = %document.id, chunk_count = document_chunks.len(), "chunked document");
            chunks.extend(document_chunks);
        }
        chunks
    }

    /// Chunk → embed → index the whole corpus.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if any chunk fails to embed or an
    /// embedding call exceeds `embed_timeout`; no partial index is produced.
    pub async fn build_index(&self, documents: &[Document]) -> Result<VectorIndex> {
        let chunks = self.chunk_documents(documents);
        let chunk_count = chunks.len();

        let index = VectorIndex::build(
            chunks,
            self.embedding_provider.as_ref(),
            self.config.metric,
            self.config.embed_timeout,
        )
        .await
        .map_err(|e| {
            error!(document_count = documents.len(), chunk_count, error = %e, "index build aborted");
            e
        })?;

        info!(document_count = documents.len(), chunk_count, "indexed corpus");
        Ok(index)
    }

    /// A retriever over `index` that embeds queries with this pipeline's provider.
    ///
    /// # Errors
    ///
    /// See [`Retriever::new`].
    pub fn retriever(&self, index: VectorIndex) -> Result<Retriever> {
        Retriever::from_index(index, self.embedding_provider.clone(), &self.config)
    }
}

/// Builder for constructing an [`IndexPipeline`].
///
/// `embedding_provider` is required. Without an explicit chunker a
/// [`RecursiveChunker`] is built from the configured chunk size and overlap.
#[derive(Default)]
pub struct IndexPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IndexPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`IndexPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the embedding provider is missing
    /// or the configuration fails [`RagConfig::validate`].
    pub fn build(self) -> Result<IndexPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        Ok(IndexPipeline { config, embedding_provider, chunker })
    }
}

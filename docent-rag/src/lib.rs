//! # docent-rag
//!
//! The retrieval half of the docent question-answering assistant: documents
//! are chunked, embedded, and stored in a [`VectorIndex`]; at query time a
//! [`Retriever`] embeds the question with the same embedder and returns the
//! top-k most similar chunks.
//!
//! ## Overview
//!
//! - [`Chunker`] - [`RecursiveChunker`] and [`FixedSizeChunker`], both with full
//!   text coverage
//! - [`EmbeddingProvider`] - the embedder seam; [`HashingEmbeddingProvider`]
//!   works offline, `OpenAIEmbeddingProvider` behind the `openai` feature
//! - [`VectorIndex`] - exact top-k search, lossless [`persist`](VectorIndex::persist)
//!   / [`load`](VectorIndex::load) with embedder validation
//! - [`SharedIndex`] - copy-on-rebuild handle for concurrent readers
//! - [`IndexPipeline`] - documents → chunks → vectors → index
//! - [`load_corpus`] - text files and directories into [`Document`]s
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docent_rag::{Document, HashingEmbeddingProvider, IndexPipeline, RagConfig};
//!
//! let pipeline = IndexPipeline::builder()
//!     .config(RagConfig::builder().chunk_size(50).chunk_overlap(0).top_k(1).build()?)
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .build()?;
//!
//! let index = pipeline
//!     .build_index(&[
//!         Document::new("sky", "The sky is blue."),
//!         Document::new("water", "Water boils at 100 degrees Celsius."),
//!     ])
//!     .await?;
//! let retriever = pipeline.retriever(index)?;
//! let results = retriever.retrieve("What color is the sky?", 1).await?;
//! assert_eq!(results[0].chunk.text, "The sky is blue.");
//! ```

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod hashing;
pub mod index;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retriever;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker, reconstruct, split};
pub use config::{RagConfig, RagConfigBuilder};
pub use corpus::{DocumentSplit, documents_from_text, load_corpus};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::{EmbedderInfo, EmbeddingProvider};
pub use error::{RagError, Result};
pub use hashing::HashingEmbeddingProvider;
pub use index::{IndexEntry, Metric, SharedIndex, VectorIndex};
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
pub use pipeline::{IndexPipeline, IndexPipelineBuilder};
pub use retriever::Retriever;

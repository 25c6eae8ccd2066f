//! Error types for the `docent-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while chunking, embedding, indexing or retrieving.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedder failed, timed out, or returned a malformed vector.
    ///
    /// During an index build this aborts the whole build. At query time it is
    /// safe to retry.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector does not have the dimension the index was built with.
    ///
    /// Fatal for the loaded index: it must be rebuilt with the current embedder.
    #[error("Dimension mismatch: index expects {expected} dimensions, got {actual}")]
    DimensionMismatch {
        /// The dimension recorded in the index.
        expected: usize,
        /// The dimension that was supplied.
        actual: usize,
    },

    /// The index was built by a different embedding model than the one in use.
    #[error("Embedder mismatch: index was built with '{index}', provider is '{provider}'")]
    EmbedderMismatch {
        /// Model id recorded in the index.
        index: String,
        /// Model id reported by the current provider.
        provider: String,
    },

    /// The persisted index is missing, unreadable, or not a docent index.
    #[error("Index unavailable at {}: {message}", path.display())]
    IndexUnavailable {
        /// Location of the index file.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An I/O error outside of index loading (corpus reading, persisting).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub(crate) fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn unavailable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IndexUnavailable { path: path.into(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

//! Error types for the `docent-chat` crate.

use std::time::Duration;

use docent_model::ModelError;
use docent_rag::RagError;
use thiserror::Error;

/// Errors surfaced by a [`ChatSession`](crate::ChatSession) turn.
///
/// A failed turn never touches conversation memory, so any error can be
/// followed by another question on the same session.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The question was empty or whitespace only.
    #[error("Question must not be empty")]
    EmptyQuery,

    /// Embedding the query or searching the index failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RagError),

    /// The answer generator returned an error.
    #[error("Generation error ({generator}): {message}")]
    Generation {
        /// Name of the generator that failed.
        generator: String,
        /// A description of the failure.
        message: String,
    },

    /// A model call did not finish within its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The deadline that was exceeded.
        after: Duration,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChatError {
    pub(crate) fn generation(generator: &str, error: ModelError) -> Self {
        Self::Generation { generator: generator.to_string(), message: error.to_string() }
    }

    /// Whether asking the same question again may succeed.
    ///
    /// Generator failures, timeouts and query embedding failures are transient.
    /// Empty questions, configuration errors and index problems are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Generation { .. }
                | Self::Timeout { .. }
                | Self::Retrieval(RagError::EmbeddingError { .. })
        )
    }
}

/// A convenience result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(!ChatError::EmptyQuery.is_retryable());
        assert!(ChatError::generation("mock", ModelError::Config("x".into())).is_retryable());
        assert!(
            ChatError::Timeout { operation: "generation".into(), after: Duration::from_secs(1) }
                .is_retryable()
        );
        assert!(
            ChatError::from(RagError::EmbeddingError { provider: "p".into(), message: "m".into() })
                .is_retryable()
        );
        assert!(
            !ChatError::from(RagError::DimensionMismatch { expected: 2, actual: 3 }).is_retryable()
        );
    }
}

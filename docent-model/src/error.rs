//! Error types for docent-model.

use thiserror::Error;

/// Errors that can occur while generating an answer.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The request could not be sent or the connection failed.
    #[error("Request to {provider} failed: {message}")]
    Request {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The provider answered with an error status.
    #[error("{provider} API returned {status}: {message}")]
    Api {
        /// The generator that produced the error.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Error detail from the response body.
        message: String,
    },

    /// The response could not be decoded.
    #[error("Failed to parse {provider} response: {message}")]
    Parse {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Invalid generator configuration (missing key, empty model name).
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for ModelError
pub type Result<T> = std::result::Result<T, ModelError>;

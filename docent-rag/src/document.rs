//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new(), source_uri: None }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the source URI.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    /// Whether the document has no retrievable content.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A contiguous segment of a [`Document`], the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk, `{document_id}_{chunk_index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Offset of the first character of `text` in the parent document, in chars.
    pub start: usize,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Offset one past the last character of this chunk, in chars.
    pub fn end(&self) -> usize {
        self.start + self.text.chars().count()
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

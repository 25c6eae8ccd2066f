//! OpenAI-compatible embedding provider.
//!
//! This module is only available when the `openai` feature is enabled. Any
//! host serving the `/v1/embeddings` API shape works (OpenAI, vLLM, Ollama,
//! text-embeddings-inference) via [`OpenAIEmbeddingProvider::with_base_url`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `base_url` – defaults to `https://api.openai.com/v1`.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use docent_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    model_id: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("OpenAI API key must not be empty".into()));
        }

        let mut provider = Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            model_id: String::new(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        };
        provider.refresh_model_id();
        Ok(provider)
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::ConfigError("OPENAI_API_KEY is not set".into()))?;
        Self::new(api_key)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    ///
    /// Also set [`with_dimensions`](Self::with_dimensions) when the model's
    /// native size differs from the default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.refresh_model_id();
        self
    }

    /// Point the provider at another OpenAI-compatible host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Request vectors truncated to `dims` (Matryoshka models).
    ///
    /// Changes both [`dimensions()`](EmbeddingProvider::dimensions) and the
    /// model id, so an index built at one size refuses queries at another.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self.refresh_model_id();
        self
    }

    fn refresh_model_id(&mut self) {
        self.model_id = format!("{OPENAI_MODEL_PREFIX}/{}/{}", self.model, self.dimensions);
    }

    fn failure(&self, message: impl Into<String>) -> RagError {
        let message = message.into();
        error!(model = %self.model_id, error = %message, "embedding request failed");
        RagError::embedding(&self.model_id, message)
    }

    /// Put the returned vectors back in input order and check there is
    /// exactly one per input.
    fn decode(&self, expected: usize, data: Vec<EmbeddingData>) -> Result<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(self.failure(format!("expected {expected} embeddings, got {}", data.len())));
        }
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
        for item in data {
            let Some(slot) = slots.get_mut(item.index) else {
                return Err(self.failure(format!("embedding index {} out of range", item.index)));
            };
            if slot.replace(item.embedding).is_some() {
                return Err(self.failure(format!("duplicate embedding index {}", item.index)));
            }
        }
        // Every slot is filled: `expected` distinct in-range indices were seen.
        Ok(slots.into_iter().flatten().collect())
    }
}

/// Model ids of this provider look like `openai/{model}/{dimensions}`.
pub const OPENAI_MODEL_PREFIX: &str = "openai";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// The API's own error message when the body carries one, else the raw body.
fn api_error_detail(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body)
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| self.failure("API returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model_id, batch_size = texts.len(), "embedding batch");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.failure(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.failure(format!("API returned {status}: {}", api_error_detail(body))));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| self.failure(format!("failed to parse response: {e}")))?;
        self.decode(texts.len(), parsed.data)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

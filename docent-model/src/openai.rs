//! Generator for OpenAI-compatible chat-completion APIs.
//!
//! This module is only available when the `openai` feature is enabled. It
//! talks to `/chat/completions` directly over `reqwest`, which covers OpenAI
//! itself and compatible hosts such as Groq, vLLM and Ollama.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ModelError, Result};
use crate::generator::{AnswerGenerator, TextStream};

/// The default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Groq's OpenAI-compatible endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default Groq model.
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// An [`AnswerGenerator`] backed by an OpenAI-compatible chat-completions API.
///
/// The prompt is sent as a single user message. Temperature defaults to 0 so
/// answers are as reproducible as the provider allows.
///
/// # Example
///
/// ```rust,ignore
/// use docent_model::openai::OpenAICompatibleGenerator;
///
/// let generator = OpenAICompatibleGenerator::groq(std::env::var("GROQ_API_KEY")?)?;
/// let answer = generator.generate(&prompt, 512).await?;
/// ```
pub struct OpenAICompatibleGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAICompatibleGenerator {
    /// Create a generator for `model` on the OpenAI API.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let model = model.into();
        if api_key.is_empty() {
            return Err(ModelError::Config("API key must not be empty".into()));
        }
        if model.is_empty() {
            return Err(ModelError::Config("model name must not be empty".into()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
            model,
            temperature: 0.0,
        })
    }

    /// Create a generator for Groq's hosted `llama-3.3-70b-versatile`.
    pub fn groq(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::new(api_key, GROQ_DEFAULT_MODEL)?.with_base_url(GROQ_BASE_URL))
    }

    /// Point the generator at another OpenAI-compatible host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn send(&self, prompt: &str, max_tokens: usize, stream: bool) -> Result<reqwest::Response> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens,
            temperature: self.temperature,
            stream,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), max_tokens, stream, "sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "request failed");
                ModelError::Request { provider: self.model.clone(), message: e.to_string() }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(model = %self.model, %status, "API error");
            return Err(ModelError::Api { provider: self.model.clone(), status: status.as_u16(), message });
        }

        Ok(response)
    }
}

// ── Chat-completions request/response types ───────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// One decoded server-sent-events line.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Text(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str, provider: &str) -> Result<SseEvent> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }

    let chunk: ChatChunk = serde_json::from_str(data).map_err(|e| ModelError::Parse {
        provider: provider.to_string(),
        message: format!("invalid stream chunk: {e}"),
    })?;
    let text: String = chunk.choices.into_iter().filter_map(|c| c.delta.content).collect();
    Ok(if text.is_empty() { SseEvent::Skip } else { SseEvent::Text(text) })
}

// ── AnswerGenerator implementation ────────────────────────────────

#[async_trait]
impl AnswerGenerator for OpenAICompatibleGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let response = self.send(prompt, max_tokens, false).await?;
        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse response");
            ModelError::Parse { provider: self.model.clone(), message: e.to_string() }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Parse {
                provider: self.model.clone(),
                message: "response contained no message content".into(),
            })
    }

    async fn stream(&self, prompt: &str, max_tokens: usize) -> Result<TextStream> {
        let response = self.send(prompt, max_tokens, true).await?;
        Ok(sse_text_stream(response.bytes_stream(), self.model.clone()))
    }
}

/// Decode a server-sent-events body into text fragments.
///
/// Lines are split on raw bytes so multi-byte characters cut across network
/// chunks survive. Decoding stops at `data: [DONE]` or the end of the body.
fn sse_text_stream<S, B, E>(bytes: S, provider: String) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;
        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| ModelError::Request {
                provider: provider.clone(),
                message: format!("stream interrupted: {e}"),
            })?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_sse_line(String::from_utf8_lossy(&line).trim_end(), &provider)? {
                    SseEvent::Text(text) => yield text,
                    SseEvent::Done => {
                        done = true;
                        break 'read;
                    }
                    SseEvent::Skip => {}
                }
            }
        }

        // The body may end without a trailing newline.
        if !done {
            let rest = String::from_utf8_lossy(&buffer).trim().to_string();
            if let SseEvent::Text(text) = parse_sse_line(&rest, &provider)? {
                yield text;
            }
        }
    })
}

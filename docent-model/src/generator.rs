//! The answer generator seam.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;

/// A finite, ordered stream of text fragments from a generator.
///
/// Concatenating the items in order yields the full completion. Dropping the
/// stream early stops consumption without affecting the generator.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A black-box text-completion model.
///
/// # Example
///
/// ```rust,ignore
/// use docent_model::AnswerGenerator;
///
/// let answer = generator.generate("Question: What is IFRS 9?\nAnswer:", 256).await?;
/// ```
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Name of the model, for logs and error messages.
    fn name(&self) -> &str;

    /// Complete `prompt`, producing at most `max_tokens` tokens.
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String>;

    /// Complete `prompt` incrementally.
    ///
    /// The default implementation calls [`generate`](AnswerGenerator::generate)
    /// and yields its output as a single fragment. Backends with native
    /// streaming should override it.
    async fn stream(&self, prompt: &str, max_tokens: usize) -> Result<TextStream> {
        let text = self.generate(prompt, max_tokens).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }
}

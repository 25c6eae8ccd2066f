//! Scripted generator for tests and offline demos.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ModelError, Result};
use crate::generator::{AnswerGenerator, TextStream};

/// A generator that replays scripted responses and records every prompt.
///
/// Scripted outcomes are consumed in order; once they run out the fallback
/// answer is returned for every call.
///
/// # Example
///
/// ```rust,ignore
/// use docent_model::MockGenerator;
///
/// let generator = MockGenerator::new("mock")
///     .with_response("The sky is blue.")
///     .with_failure("provider overloaded");
/// ```
#[derive(Debug)]
pub struct MockGenerator {
    name: String,
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    fallback: String,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Create a generator whose fallback answer is `"I don't know."`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: "I don't know.".to_string(),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.lock_script().push_back(Ok(text.into()));
        self
    }

    /// Queue a failing call.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.lock_script().push_back(Err(message.into()));
        self
    }

    /// Answer returned once the script is exhausted.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = text.into();
        self
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<std::result::Result<String, String>>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn next_outcome(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.lock_script().pop_front();
        match scripted {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ModelError::Request { provider: self.name.clone(), message }),
            None => Ok(self.fallback.clone()),
        }
    }
}

#[async_trait]
impl AnswerGenerator for MockGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, _max_tokens: usize) -> Result<String> {
        self.next_outcome(prompt).await
    }

    /// Streams the scripted answer word by word (whitespace kept).
    async fn stream(&self, prompt: &str, _max_tokens: usize) -> Result<TextStream> {
        let text = self.next_outcome(prompt).await?;
        let fragments: Vec<Result<String>> =
            text.split_inclusive(' ').map(|word| Ok(word.to_string())).collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn replays_script_then_fallback() {
        let generator = MockGenerator::new("mock").with_response("first").with_failure("down");

        assert_eq!(generator.generate("p1", 16).await.unwrap(), "first");
        assert!(matches!(generator.generate("p2", 16).await, Err(ModelError::Request { .. })));
        assert_eq!(generator.generate("p3", 16).await.unwrap(), "I don't know.");
        assert_eq!(generator.prompts(), ["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn streams_words_in_order() {
        let generator = MockGenerator::new("mock").with_response("the sky is blue");
        let stream = generator.stream("p", 16).await.unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
        assert_eq!(fragments, ["the ", "sky ", "is ", "blue"]);
        assert_eq!(fragments.concat(), "the sky is blue");
    }
}

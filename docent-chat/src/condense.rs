//! Turning a follow-up question into a standalone retrieval query.
//!
//! Follow-ups such as "What about Y?" retrieve poorly on their own. A
//! [`QueryCondenser`] folds the conversation into the query before it is
//! embedded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docent_model::AnswerGenerator;
use tracing::{debug, warn};

use crate::memory::Turn;

/// Produces the query used for retrieval from a question and prior turns.
#[async_trait]
pub trait QueryCondenser: Send + Sync {
    /// Return the standalone query for `question` given `history` (oldest first).
    async fn condense(&self, question: &str, history: &[Turn]) -> String;
}

/// Joins the most recent prior questions with the new one.
///
/// With no history the question is returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConcatCondenser {
    window: usize,
}

impl HistoryConcatCondenser {
    /// Keep up to `window` prior questions.
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    fn concat(&self, question: &str, history: &[Turn]) -> String {
        let skip = history.len().saturating_sub(self.window);
        let mut parts: Vec<&str> = history[skip..].iter().map(|t| t.question.as_str()).collect();
        parts.push(question);
        parts.join("\n")
    }
}

impl Default for HistoryConcatCondenser {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl QueryCondenser for HistoryConcatCondenser {
    async fn condense(&self, question: &str, history: &[Turn]) -> String {
        self.concat(question, history)
    }
}

/// Instruction used to rephrase a follow-up into a standalone question.
pub const CONDENSE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

/// Asks the answer generator to rewrite the follow-up as a standalone question.
///
/// Falls back to [`HistoryConcatCondenser`] when the generator fails, times
/// out, or returns nothing.
pub struct LlmCondenser {
    generator: Arc<dyn AnswerGenerator>,
    fallback: HistoryConcatCondenser,
    max_tokens: usize,
    timeout: Duration,
}

impl LlmCondenser {
    pub fn new(generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            generator,
            fallback: HistoryConcatCondenser::default(),
            max_tokens: 128,
            timeout: Duration::from_secs(30),
        }
    }

    /// Condenser used when the generator cannot help.
    pub fn with_fallback(mut self, fallback: HistoryConcatCondenser) -> Self {
        self.fallback = fallback;
        self
    }

    /// Deadline for the rephrasing call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn prompt(question: &str, history: &[Turn]) -> String {
        let mut prompt = format!("{CONDENSE_PROMPT}\n\nChat History:\n");
        for turn in history {
            prompt.push_str(&format!("Human: {}\nAssistant: {}\n", turn.question, turn.answer));
        }
        prompt.push_str(&format!("Follow Up Input: {question}\nStandalone question:"));
        prompt
    }
}

impl std::fmt::Debug for LlmCondenser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmCondenser")
            .field("generator", &self.generator.name())
            .field("fallback", &self.fallback)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl QueryCondenser for LlmCondenser {
    async fn condense(&self, question: &str, history: &[Turn]) -> String {
        if history.is_empty() {
            return question.to_string();
        }

        let prompt = Self::prompt(question, history);
        let outcome =
            tokio::time::timeout(self.timeout, self.generator.generate(&prompt, self.max_tokens))
                .await;

        match outcome {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                let standalone = text.trim().to_string();
                debug!(standalone = %standalone, "condensed follow-up question");
                standalone
            }
            Ok(Ok(_)) => {
                warn!(generator = self.generator.name(), "empty condensed question, concatenating history");
                self.fallback.concat(question, history)
            }
            Ok(Err(e)) => {
                warn!(generator = self.generator.name(), error = %e, "condense failed, concatenating history");
                self.fallback.concat(question, history)
            }
            Err(_) => {
                warn!(generator = self.generator.name(), timeout = ?self.timeout, "condense timed out, concatenating history");
                self.fallback.concat(question, history)
            }
        }
    }
}

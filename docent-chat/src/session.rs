//! The question-answering session.

use std::sync::Arc;

use docent_model::{AnswerGenerator, ModelError};
use docent_rag::{Retriever, SearchResult};
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::condense::{HistoryConcatCondenser, LlmCondenser, QueryCondenser};
use crate::config::{ChatConfig, CondenseMode};
use crate::error::{ChatError, Result};
use crate::memory::{ConversationMemory, Turn};
use crate::prompt::{AssembledPrompt, PromptBuilder};

/// Phase of the turn a session is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Retrieving,
    Generating,
}

/// The result of a successful turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// The generated answer.
    pub text: String,
    /// Chunks the answer was grounded on, best first.
    pub sources: Vec<SearchResult>,
    /// The query actually used for retrieval.
    pub standalone_question: String,
}

/// A conversation over one corpus.
///
/// Each call to [`answer`](Self::answer) runs
/// `Idle -> Retrieving -> Generating -> Idle`. Turns are strictly sequential
/// because every turn borrows the session mutably. Memory is only updated when
/// a turn succeeds.
///
/// # Example
///
/// ```rust,ignore
/// use docent_chat::ChatSession;
///
/// let mut session = ChatSession::builder()
///     .retriever(Arc::new(retriever))
///     .generator(generator)
///     .build()?;
/// let answer = session.answer("What color is the sky?").await?;
/// println!("{}", answer.text);
/// ```
pub struct ChatSession {
    retriever: Arc<Retriever>,
    generator: Arc<dyn AnswerGenerator>,
    condenser: Arc<dyn QueryCondenser>,
    prompt: PromptBuilder,
    memory: ConversationMemory,
    config: ChatConfig,
    state: SessionState,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("generator", &self.generator.name())
            .field("turns", &self.memory.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Create a new builder for constructing a [`ChatSession`].
    pub fn builder() -> ChatSessionBuilder {
        ChatSessionBuilder::default()
    }

    /// Phase of the current turn.
    ///
    /// A turn whose future is dropped midway leaves the phase it reached; the
    /// next turn starts by returning the session to [`SessionState::Idle`].
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Completed turns, oldest first.
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &Turn> + ExactSizeIterator {
        self.memory.history()
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Forget the conversation. The index and collaborators are untouched.
    pub fn reset(&mut self) {
        self.memory.reset();
        info!("conversation reset");
    }

    /// Answer `question`, using the conversation so far for retrieval.
    ///
    /// # Errors
    ///
    /// - [`ChatError::EmptyQuery`] for an empty or whitespace question
    /// - [`ChatError::Retrieval`] if the query cannot be embedded or searched
    /// - [`ChatError::Generation`] / [`ChatError::Timeout`] if the generator
    ///   fails or exceeds `generation_timeout`
    ///
    /// Memory is unchanged on every error.
    pub async fn answer(&mut self, question: &str) -> Result<Answer> {
        self.begin_turn();
        let question = validate(question)?;
        let (standalone_question, prompt) = self.prepare(question).await?;

        self.transition(SessionState::Generating);
        let generator = Arc::clone(&self.generator);
        let timeout = self.config.generation_timeout;
        let outcome =
            tokio::time::timeout(timeout, generator.generate(&prompt.text, self.config.max_tokens))
                .await;
        self.transition(SessionState::Idle);

        let text = self.finish_generation(outcome)?;
        Ok(self.record(question, text, prompt, standalone_question))
    }

    /// Like [`answer`](Self::answer) but hands each generated fragment to
    /// `on_text` as it arrives.
    ///
    /// The turn is recorded only once the stream has completed. If the stream
    /// fails midway `on_text` has already seen a partial answer, but memory is
    /// unchanged.
    pub async fn answer_streaming<F>(&mut self, question: &str, mut on_text: F) -> Result<Answer>
    where
        F: FnMut(&str) + Send,
    {
        self.begin_turn();
        let question = validate(question)?;
        let (standalone_question, prompt) = self.prepare(question).await?;

        self.transition(SessionState::Generating);
        let generator = Arc::clone(&self.generator);
        let max_tokens = self.config.max_tokens;
        let timeout = self.config.generation_timeout;
        let outcome = tokio::time::timeout(timeout, async {
            let mut stream = generator.stream(&prompt.text, max_tokens).await?;
            let mut text = String::new();
            while let Some(fragment) = stream.next().await {
                let fragment = fragment?;
                on_text(&fragment);
                text.push_str(&fragment);
            }
            Ok::<_, ModelError>(text)
        })
        .await;
        self.transition(SessionState::Idle);

        let text = self.finish_generation(outcome)?;
        Ok(self.record(question, text, prompt, standalone_question))
    }

    fn begin_turn(&mut self) {
        if self.state != SessionState::Idle {
            warn!(state = ?self.state, "previous turn was cancelled");
            self.transition(SessionState::Idle);
        }
    }

    /// Condense, retrieve and assemble the prompt for `question`.
    async fn prepare(&mut self, question: &str) -> Result<(String, AssembledPrompt)> {
        info!(question_len = question.chars().count(), turns = self.memory.len(), "answering question");
        self.transition(SessionState::Retrieving);

        let history: Vec<Turn> = self.memory.history().cloned().collect();
        let standalone = self.condenser.condense(question, &history).await;
        debug!(standalone = %standalone, "retrieval query");

        let results = match self.retriever.retrieve(&standalone, self.config.top_k).await {
            Ok(results) => results,
            Err(e) => {
                self.transition(SessionState::Idle);
                warn!(error = %e, "retrieval failed");
                return Err(e.into());
            }
        };

        let prompt = self.prompt.assemble(&results, &history, question);
        debug!(
            chunk_count = prompt.sources.len(),
            turns_used = prompt.turns_used,
            truncated = prompt.truncated,
            "prompt assembled"
        );
        Ok((standalone, prompt))
    }

    fn finish_generation(
        &self,
        outcome: std::result::Result<docent_model::Result<String>, tokio::time::error::Elapsed>,
    ) -> Result<String> {
        match outcome {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                warn!(generator = self.generator.name(), error = %e, "generation failed");
                Err(ChatError::generation(self.generator.name(), e))
            }
            Err(_) => {
                let after = self.config.generation_timeout;
                warn!(generator = self.generator.name(), timeout = ?after, "generation timed out");
                Err(ChatError::Timeout { operation: "generation".to_string(), after })
            }
        }
    }

    fn record(
        &mut self,
        question: &str,
        text: String,
        prompt: AssembledPrompt,
        standalone_question: String,
    ) -> Answer {
        self.memory.append(question, text.clone());
        info!(
            source_count = prompt.sources.len(),
            answer_len = text.chars().count(),
            turns = self.memory.len(),
            "turn completed"
        );
        Answer { text, sources: prompt.sources, standalone_question }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

fn validate(question: &str) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(ChatError::EmptyQuery);
    }
    Ok(question)
}

/// Builder for constructing a [`ChatSession`].
///
/// `retriever` and `generator` are required. Without an explicit condenser
/// one is built from [`ChatConfig::condense`].
#[derive(Default)]
pub struct ChatSessionBuilder {
    retriever: Option<Arc<Retriever>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    condenser: Option<Arc<dyn QueryCondenser>>,
    prompt: Option<PromptBuilder>,
    config: Option<ChatConfig>,
}

impl ChatSessionBuilder {
    pub fn retriever(mut self, retriever: Arc<Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the condensation policy from the config.
    pub fn condenser(mut self, condenser: Arc<dyn QueryCondenser>) -> Self {
        self.condenser = Some(condenser);
        self
    }

    /// Use custom prompt instructions. The budget is taken from the config.
    pub fn prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn config(mut self, config: ChatConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the [`ChatSession`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if the retriever or generator is missing
    /// or the config fails [`ChatConfig::validate`].
    pub fn build(self) -> Result<ChatSession> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let retriever =
            self.retriever.ok_or_else(|| ChatError::Config("retriever is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| ChatError::Config("generator is required".to_string()))?;

        let condenser: Arc<dyn QueryCondenser> = match (self.condenser, config.condense) {
            (Some(condenser), _) => condenser,
            (None, CondenseMode::HistoryConcat) => {
                Arc::new(HistoryConcatCondenser::new(config.condense_window))
            }
            (None, CondenseMode::Llm) => Arc::new(
                LlmCondenser::new(Arc::clone(&generator))
                    .with_fallback(HistoryConcatCondenser::new(config.condense_window))
                    .with_timeout(config.generation_timeout),
            ),
        };

        let prompt = match self.prompt {
            Some(prompt) => prompt.with_budget_chars(config.prompt_budget_chars),
            None => PromptBuilder::new(config.prompt_budget_chars),
        };

        let memory = match config.max_history_turns {
            Some(max) => ConversationMemory::with_max_turns(max),
            None => ConversationMemory::new(),
        };

        Ok(ChatSession {
            retriever,
            generator,
            condenser,
            prompt,
            memory,
            config,
            state: SessionState::Idle,
        })
    }
}

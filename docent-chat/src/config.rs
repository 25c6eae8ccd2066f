//! Configuration for chat sessions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// How follow-up questions are turned into retrieval queries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CondenseMode {
    /// Concatenate recent prior questions with the new one.
    #[default]
    HistoryConcat,
    /// Ask the answer generator to rephrase the follow-up.
    Llm,
}

/// Configuration parameters for a [`ChatSession`](crate::ChatSession).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Upper bound on generated tokens per answer.
    pub max_tokens: usize,
    /// Keep at most this many turns in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history_turns: Option<usize>,
    /// Prompt size budget in characters.
    pub prompt_budget_chars: usize,
    /// Deadline for a single generation call, streaming included.
    pub generation_timeout: Duration,
    /// Condensation policy.
    #[serde(default)]
    pub condense: CondenseMode,
    /// Prior questions considered when concatenating history.
    pub condense_window: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_tokens: 512,
            max_history_turns: None,
            prompt_budget_chars: 16_000,
            generation_timeout: Duration::from_secs(60),
            condense: CondenseMode::HistoryConcat,
            condense_window: 3,
        }
    }
}

impl ChatConfig {
    /// Create a new builder for constructing a [`ChatConfig`].
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }

    /// Check that every count, budget and timeout is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(ChatError::Config("top_k must be greater than zero".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ChatError::Config("max_tokens must be greater than zero".to_string()));
        }
        if self.max_history_turns == Some(0) {
            return Err(ChatError::Config("max_history_turns must be greater than zero".to_string()));
        }
        if self.prompt_budget_chars == 0 {
            return Err(ChatError::Config("prompt_budget_chars must be greater than zero".to_string()));
        }
        if self.generation_timeout.is_zero() {
            return Err(ChatError::Config("generation_timeout must be non-zero".to_string()));
        }
        if self.condense_window == 0 {
            return Err(ChatError::Config("condense_window must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`ChatConfig`].
#[derive(Debug, Clone, Default)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Bound conversation memory, evicting the oldest turns.
    pub fn max_history_turns(mut self, turns: usize) -> Self {
        self.config.max_history_turns = Some(turns);
        self
    }

    pub fn prompt_budget_chars(mut self, budget: usize) -> Self {
        self.config.prompt_budget_chars = budget;
        self
    }

    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout = timeout;
        self
    }

    pub fn condense(mut self, mode: CondenseMode) -> Self {
        self.config.condense = mode;
        self
    }

    pub fn condense_window(mut self, window: usize) -> Self {
        self.config.condense_window = window;
        self
    }

    /// Build the [`ChatConfig`].
    ///
    /// # Errors
    ///
    /// See [`ChatConfig::validate`].
    pub fn build(self) -> Result<ChatConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = ChatConfig::builder().build().unwrap();
        assert_eq!(config, ChatConfig::default());
        assert_eq!(config.condense, CondenseMode::HistoryConcat);
    }

    #[test]
    fn builder_rejects_zero_values() {
        assert!(ChatConfig::builder().top_k(0).build().is_err());
        assert!(ChatConfig::builder().max_tokens(0).build().is_err());
        assert!(ChatConfig::builder().max_history_turns(0).build().is_err());
        assert!(ChatConfig::builder().prompt_budget_chars(0).build().is_err());
        assert!(ChatConfig::builder().generation_timeout(Duration::ZERO).build().is_err());
        assert!(ChatConfig::builder().condense_window(0).build().is_err());
    }

    #[test]
    fn deserialized_config_is_validated() {
        let mut value = serde_json::to_value(ChatConfig::default()).unwrap();
        value["max_history_turns"] = serde_json::json!(0);
        let config: ChatConfig = serde_json::from_value(value).unwrap();
        assert!(matches!(config.validate(), Err(ChatError::Config(_))));
    }

    #[test]
    fn condense_mode_serializes_snake_case() {
        let json = serde_json::to_string(&CondenseMode::HistoryConcat).unwrap();
        assert_eq!(json, "\"history_concat\"");
        let mode: CondenseMode = serde_json::from_str("\"llm\"").unwrap();
        assert_eq!(mode, CondenseMode::Llm);
    }
}

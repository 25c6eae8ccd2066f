//! Bounded prompt assembly.

use docent_rag::SearchResult;
use tracing::debug;

use crate::memory::Turn;

/// Default answering instructions.
pub const DEFAULT_INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// A prompt ready for the answer generator.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    /// The full prompt text.
    pub text: String,
    /// Chunks that made it into the prompt, best first.
    pub sources: Vec<SearchResult>,
    /// Number of prior turns included (the most recent ones).
    pub turns_used: usize,
    /// Whether anything was dropped to fit the budget.
    pub truncated: bool,
}

/// Lays out instructions, retrieved context, prior turns and the question
/// within a character budget.
///
/// Layout:
///
/// ```text
/// {instructions}
///
/// {chunk 1}
///
/// {chunk 2}
///
/// Chat History:
/// Human: {question}
/// Assistant: {answer}
///
/// Question: {question}
/// Helpful Answer:
/// ```
///
/// When the prompt exceeds the budget the oldest turns are dropped first,
/// then the least similar chunks. Instructions and the question are never
/// dropped, so a tiny budget can still be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    instructions: String,
    budget_chars: usize,
}

impl PromptBuilder {
    pub fn new(budget_chars: usize) -> Self {
        Self { instructions: DEFAULT_INSTRUCTIONS.to_string(), budget_chars }
    }

    /// Replace the answering instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_budget_chars(mut self, budget_chars: usize) -> Self {
        self.budget_chars = budget_chars;
        self
    }

    pub fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    /// Assemble a prompt for `question` from retrieved `chunks` and `history`
    /// (oldest first).
    pub fn assemble(&self, chunks: &[SearchResult], history: &[Turn], question: &str) -> AssembledPrompt {
        let mut sources = chunks.to_vec();
        sources.sort_by(|a, b| b.score.total_cmp(&a.score));
        let mut first_turn = 0;
        let mut truncated = false;

        let text = loop {
            let text = self.render(&sources, &history[first_turn..], question);
            if text.chars().count() <= self.budget_chars {
                break text;
            }
            if first_turn < history.len() {
                first_turn += 1;
            } else if sources.pop().is_none() {
                break text;
            }
            truncated = true;
        };

        let turns_used = history.len() - first_turn;
        if truncated {
            debug!(
                budget_chars = self.budget_chars,
                chunk_count = sources.len(),
                turns_used,
                "prompt truncated to fit budget"
            );
        }

        AssembledPrompt { text, sources, turns_used, truncated }
    }

    fn render(&self, sources: &[SearchResult], history: &[Turn], question: &str) -> String {
        let mut text = self.instructions.clone();
        text.push_str("\n\n");
        for source in sources {
            text.push_str(&source.chunk.text);
            text.push_str("\n\n");
        }
        if !history.is_empty() {
            text.push_str("Chat History:\n");
            for turn in history {
                text.push_str(&format!("Human: {}\nAssistant: {}\n", turn.question, turn.answer));
            }
            text.push('\n');
        }
        text.push_str(&format!("Question: {question}\nHelpful Answer:"));
        text
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(16_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_rag::Chunk;

    fn result(id: &str, text: &str, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: format!("{id}_0"),
                document_id: id.to_string(),
                text: text.to_string(),
                start: 0,
                metadata: Default::default(),
            },
            score,
        }
    }

    fn chunks() -> Vec<SearchResult> {
        vec![result("sky", "The sky is blue.", 0.9), result("water", "Water boils at 100 degrees.", 0.2)]
    }

    #[test]
    fn lays_out_sections_in_order() {
        let history = [Turn::new("Hi?", "Hello.")];
        let prompt = PromptBuilder::default().assemble(&chunks(), &history, "What color is the sky?");

        assert!(prompt.text.starts_with(DEFAULT_INSTRUCTIONS));
        let sky = prompt.text.find("The sky is blue.").unwrap();
        let water = prompt.text.find("Water boils").unwrap();
        let turn = prompt.text.find("Human: Hi?\nAssistant: Hello.").unwrap();
        let question = prompt.text.find("Question: What color is the sky?").unwrap();
        assert!(sky < water && water < turn && turn < question);
        assert!(prompt.text.ends_with("Helpful Answer:"));
        assert!(!prompt.truncated);
        assert_eq!(prompt.turns_used, 1);
        assert_eq!(prompt.sources, chunks());
    }

    #[test]
    fn drops_oldest_turns_before_chunks() {
        let history = [Turn::new("old question", "old answer"), Turn::new("new question", "new answer")];
        let full = PromptBuilder::default().assemble(&chunks(), &history, "Q");
        let budget = full.text.chars().count() - 1;

        let prompt = PromptBuilder::new(budget).assemble(&chunks(), &history, "Q");
        assert!(prompt.truncated);
        assert_eq!(prompt.turns_used, 1);
        assert!(!prompt.text.contains("old question"));
        assert!(prompt.text.contains("new question"));
        assert_eq!(prompt.sources.len(), 2);
    }

    #[test]
    fn drops_least_similar_chunk_after_turns() {
        let history = [Turn::new("old question", "old answer")];
        let without_history = PromptBuilder::default().assemble(&chunks(), &[], "Q");
        let budget = without_history.text.chars().count() - 1;

        let prompt = PromptBuilder::new(budget).assemble(&chunks(), &history, "Q");
        assert!(prompt.truncated);
        assert_eq!(prompt.turns_used, 0);
        assert_eq!(prompt.sources.len(), 1);
        assert_eq!(prompt.sources[0].chunk.document_id, "sky");
        assert!(!prompt.text.contains("Water boils"));
        assert!(prompt.text.chars().count() <= budget);
    }

    #[test]
    fn keeps_instructions_and_question_under_tiny_budget() {
        let prompt = PromptBuilder::new(10).assemble(&chunks(), &[], "What color is the sky?");
        assert!(prompt.truncated);
        assert!(prompt.sources.is_empty());
        assert!(prompt.text.contains("Question: What color is the sky?"));
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let chunk = [result("umlaut", "Grüße über Äpfel", 1.0)];
        let full = PromptBuilder::default().assemble(&chunk, &[], "Wie?");
        let prompt = PromptBuilder::new(full.text.chars().count()).assemble(&chunk, &[], "Wie?");
        assert!(!prompt.truncated);
        assert!(full.text.len() > full.text.chars().count());
    }
}

//! # docent-chat
//!
//! Conversational question answering over a docent index.
//!
//! A [`ChatSession`] owns the conversation: each question is condensed with
//! the prior turns into a standalone retrieval query, the top-k chunks are
//! retrieved, a bounded prompt is assembled, and the answer generator is
//! called with a deadline. Only successful turns are remembered.
//!
//! ## Overview
//!
//! - [`ConversationMemory`] - ordered turns with optional bound
//! - [`QueryCondenser`] - [`HistoryConcatCondenser`] (default) or [`LlmCondenser`]
//! - [`PromptBuilder`] - instructions, context, history and question within a
//!   character budget
//! - [`ChatSession`] - the `Idle -> Retrieving -> Generating -> Idle` turn loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docent_chat::{ChatConfig, ChatSession};
//! use docent_model::MockGenerator;
//!
//! let retriever = Arc::new(pipeline.retriever(index)?);
//! let mut session = ChatSession::builder()
//!     .retriever(retriever)
//!     .generator(Arc::new(MockGenerator::new("mock").with_response("Blue.")))
//!     .config(ChatConfig::builder().top_k(1).build()?)
//!     .build()?;
//!
//! let answer = session.answer("What color is the sky?").await?;
//! assert_eq!(answer.sources[0].chunk.text, "The sky is blue.");
//! ```

pub mod condense;
pub mod config;
pub mod error;
pub mod memory;
pub mod prompt;
pub mod session;

pub use condense::{HistoryConcatCondenser, LlmCondenser, QueryCondenser};
pub use config::{ChatConfig, ChatConfigBuilder, CondenseMode};
pub use error::{ChatError, Result};
pub use memory::{ConversationMemory, Turn};
pub use prompt::{AssembledPrompt, DEFAULT_INSTRUCTIONS, PromptBuilder};
pub use session::{Answer, ChatSession, ChatSessionBuilder, SessionState};

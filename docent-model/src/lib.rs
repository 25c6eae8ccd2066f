//! # docent-model
//!
//! The answer-generation seam of the docent assistant.
//!
//! ## Overview
//!
//! - [`AnswerGenerator`] - the trait the orchestrator depends on: `generate`
//!   plus an optional streaming [`stream`](AnswerGenerator::stream)
//! - [`MockGenerator`] - scripted responses for tests and offline runs
//! - `OpenAICompatibleGenerator` - chat completions against OpenAI, Groq and
//!   other compatible hosts (feature `openai`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docent_model::openai::OpenAICompatibleGenerator;
//!
//! let generator = OpenAICompatibleGenerator::groq(std::env::var("GROQ_API_KEY")?)?;
//! let answer = generator.generate("Say hello in one word.", 16).await?;
//! ```

pub mod error;
pub mod generator;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;

pub use error::{ModelError, Result};
pub use generator::{AnswerGenerator, TextStream};
pub use mock::MockGenerator;
#[cfg(feature = "openai")]
pub use openai::OpenAICompatibleGenerator;

//! # docent-cli
//!
//! The `docent` command: build an index from text files, then ask questions
//! about it once (`docent ask`) or in a conversation (`docent chat`).
//!
//! ```text
//! docent index ifrs9.txt --output ifrs9.index.json
//! docent ask --index ifrs9.index.json "What is the expected credit loss model?"
//! docent chat --index ifrs9.index.json --stream
//! ```
//!
//! Settings can also come from the environment or a `.env` file
//! (`DOCENT_INDEX`, `DOCENT_PROVIDER`, `DOCENT_MODEL`, `GROQ_API_KEY`, ...).

pub mod cli;
pub mod commands;
pub mod console;
pub mod providers;
pub mod telemetry;

//! Syllabus - Course Materials Q&A
//!
//! Answers questions about a corpus of course materials by pairing semantic
//! search with a tool-calling language model.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `embedding` - Embedding generation
//! - `vector_store` - Course catalog and chunk index
//! - `search` - Course-name resolution, filtering and result normalization
//! - `tools` - Content search and outline tools, plus the dispatch registry
//! - `llm` - Language model capability and the OpenAI backend
//! - `agent` - The bounded tool-calling loop
//! - `session` - Per-conversation history
//! - `orchestrator` - The query entry point and course loading
//!
//! # Example
//!
//! ```rust,no_run
//! use syllabus::config::Settings;
//! use syllabus::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let response = orchestrator.query("What is covered in lesson 1?", None).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod search;
pub mod session;
pub mod tools;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{Result, SyllabusError};

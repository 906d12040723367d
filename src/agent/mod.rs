//! Tool-calling conversation loop.
//!
//! Runs a query through the language model, dispatching any tool invocations
//! it requests, for a bounded number of rounds.

mod runner;

pub use runner::{Agent, AgentResponse, ToolCallRecord, DEFAULT_MAX_ROUNDS};

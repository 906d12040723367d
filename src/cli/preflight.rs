//! Pre-flight checks before expensive operations.
//!
//! Validates configuration up front so commands fail with a clear message
//! instead of midway through a request.

use crate::error::{Result, SyllabusError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering questions calls the chat and embedding APIs.
    Query,
    /// Loading embeds course content.
    Load,
    /// Outlines resolve partial course names by embedding them.
    Outline,
    /// Listing courses reads only the local index.
    Browse,
}

impl Operation {
    fn needs_api_key(self) -> bool {
        !matches!(self, Operation::Browse)
    }
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    if operation.needs_api_key() {
        check_api_key(std::env::var("OPENAI_API_KEY").ok())
    } else {
        Ok(())
    }
}

fn check_api_key(key: Option<String>) -> Result<()> {
    match key {
        Some(key) if !key.is_empty() => Ok(()),
        Some(_) => Err(SyllabusError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(SyllabusError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

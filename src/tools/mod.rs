//! Tools exposed to the language model.
//!
//! The tool set is closed: [`Tool`] enumerates every variant and the
//! [`ToolRegistry`] maps names to instances. Dispatch never fails; every
//! outcome, including unknown names and faults inside a tool, comes back as a
//! [`ToolOutput`] the model can read.

mod outline;
mod registry;
mod search;

pub use outline::CourseOutlineTool;
pub use registry::ToolRegistry;
pub use search::CourseSearchTool;

use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Callable schema advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Attribution for a retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Course title, optionally followed by ` - Lesson N`.
    pub text: String,
    /// Lesson link, when the catalog has one.
    pub url: Option<String>,
}

/// Outcome of dispatching one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Routes tool invocations by name.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Execute the named tool. Must not fail; errors are reported in the output.
    async fn dispatch(&self, name: &str, input: &serde_json::Value) -> ToolOutput;
}

/// Every tool the model can call.
pub enum Tool {
    CourseSearch(CourseSearchTool),
    CourseOutline(CourseOutlineTool),
}

impl Tool {
    /// Name the model uses to invoke this tool.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::CourseSearch(_) => CourseSearchTool::NAME,
            Tool::CourseOutline(_) => CourseOutlineTool::NAME,
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        match self {
            Tool::CourseSearch(t) => t.definition(),
            Tool::CourseOutline(t) => t.definition(),
        }
    }

    /// Run the tool with JSON arguments.
    pub async fn execute(&self, input: &serde_json::Value) -> Result<String> {
        match self {
            Tool::CourseSearch(t) => {
                let args: search::SearchArgs = parse_args(self.name(), input)?;
                Ok(t
                    .execute(&args.query, args.course_name.as_deref(), args.lesson_number)
                    .await)
            }
            Tool::CourseOutline(t) => {
                let args: outline::OutlineArgs = parse_args(self.name(), input)?;
                t.execute(&args.course_name).await
            }
        }
    }

    /// Sources recorded by the most recent execution.
    pub fn last_sources(&self) -> Vec<Source> {
        match self {
            Tool::CourseSearch(t) => t.last_sources(),
            Tool::CourseOutline(_) => Vec::new(),
        }
    }

    pub fn reset_sources(&self) {
        if let Tool::CourseSearch(t) = self {
            t.reset_sources();
        }
    }
}

impl From<CourseSearchTool> for Tool {
    fn from(tool: CourseSearchTool) -> Self {
        Tool::CourseSearch(tool)
    }
}

impl From<CourseOutlineTool> for Tool {
    fn from(tool: CourseOutlineTool) -> Self {
        Tool::CourseOutline(tool)
    }
}

/// Deserialize tool arguments, reporting which tool rejected them.
fn parse_args<T: DeserializeOwned>(tool: &str, input: &serde_json::Value) -> Result<T> {
    serde_json::from_value(input.clone())
        .map_err(|e| SyllabusError::InvalidInput(format!("Invalid arguments for {}: {}", tool, e)))
}

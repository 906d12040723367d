//! Name-based tool routing and source bookkeeping.

use super::{Source, Tool, ToolDefinition, ToolDispatcher, ToolOutput};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Holds registered tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Registering a name twice replaces the earlier tool
    /// but keeps its position in the catalog.
    pub fn register(&mut self, tool: impl Into<Tool>) {
        let tool = tool.into();
        let name = tool.name().to_string();
        match self.by_name.get(&name) {
            Some(&i) => {
                debug!("Replacing tool '{}'", name);
                self.tools[i] = tool;
            }
            None => {
                self.by_name.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Callable schemas for every registered tool.
    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(Tool::definition).collect()
    }

    /// Run a tool by name. Unknown names and tool faults become error outputs.
    pub async fn execute(&self, name: &str, input: &serde_json::Value) -> ToolOutput {
        let Some(&i) = self.by_name.get(name) else {
            warn!("Model requested unknown tool '{}'", name);
            return ToolOutput::error(format!("Tool '{}' not found", name));
        };

        match self.tools[i].execute(input).await {
            Ok(content) => ToolOutput::success(content),
            Err(e) => {
                warn!("Tool '{}' failed: {}", name, e);
                ToolOutput::error(format!("Error: {}", e))
            }
        }
    }

    /// Sources recorded across all tools, in registration order.
    pub fn get_last_sources(&self) -> Vec<Source> {
        self.tools.iter().flat_map(Tool::last_sources).collect()
    }

    pub fn reset_sources(&self) {
        for tool in &self.tools {
            tool.reset_sources();
        }
    }

    /// Read the recorded sources and clear them.
    pub fn take_sources(&self) -> Vec<Source> {
        let sources = self.get_last_sources();
        self.reset_sources();
        sources
    }
}

#[async_trait]
impl ToolDispatcher for ToolRegistry {
    async fn dispatch(&self, name: &str, input: &serde_json::Value) -> ToolOutput {
        self.execute(name, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture_search;
    use crate::tools::{CourseOutlineTool, CourseSearchTool};
    use serde_json::json;

    async fn registry() -> ToolRegistry {
        let search = fixture_search().await;
        let mut registry = ToolRegistry::new();
        registry.register(CourseSearchTool::new(search.clone()));
        registry.register(CourseOutlineTool::new(search));
        registry
    }

    #[tokio::test]
    async fn test_definitions_in_registration_order() {
        let registry = registry().await;
        let names: Vec<String> = registry
            .get_tool_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["search_course_content", "get_course_outline"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error_output() {
        let registry = registry().await;
        let output = registry.execute("delete_everything", &json!({})).await;
        assert_eq!(output, ToolOutput::error("Tool 'delete_everything' not found"));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_an_error_output() {
        let registry = registry().await;
        let output = registry
            .dispatch("search_course_content", &json!({"lesson_number": 1}))
            .await;
        assert!(output.is_error);
        assert!(output.content.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_duplicate_registration_last_wins_in_place() {
        let search = fixture_search().await;
        let mut registry = registry().await;

        let first = registry.tools[0].definition();
        registry.register(CourseSearchTool::new(search));

        assert_eq!(registry.get_tool_definitions().len(), 2);
        assert_eq!(registry.by_name.get("search_course_content"), Some(&0));
        assert_eq!(registry.get_tool_definitions()[0], first);

        registry
            .execute("search_course_content", &json!({"query": "ownership", "course_name": "Rust", "lesson_number": 1}))
            .await;
        // The replacement instance recorded the sources.
        match &registry.tools[0] {
            Tool::CourseSearch(t) => assert_eq!(t.last_sources().len(), 1),
            _ => panic!("expected search tool at position 0"),
        }
    }

    #[tokio::test]
    async fn test_take_sources_drains() {
        let registry = registry().await;
        let output = registry
            .execute("search_course_content", &json!({"query": "rust", "course_name": "Rust"}))
            .await;
        assert!(!output.is_error);

        let sources = registry.take_sources();
        assert_eq!(sources.len(), 2);
        assert!(registry.get_last_sources().is_empty());
    }

    #[tokio::test]
    async fn test_reset_sources_clears_all_tools() {
        let registry = registry().await;
        registry
            .execute("search_course_content", &json!({"query": "traits"}))
            .await;
        assert!(!registry.get_last_sources().is_empty());

        registry.reset_sources();
        assert!(registry.get_last_sources().is_empty());
    }
}

//! Content search tool.

use super::{Source, ToolDefinition};
use crate::search::{CourseSearch, SearchResults};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub(super) struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub lesson_number: Option<i64>,
}

/// Searches course content and records where each passage came from.
pub struct CourseSearchTool {
    search: Arc<CourseSearch>,
    last_sources: Mutex<Vec<Source>>,
}

impl CourseSearchTool {
    pub const NAME: &'static str = "search_course_content";

    pub fn new(search: Arc<CourseSearch>) -> Self {
        Self {
            search,
            last_sources: Mutex::new(Vec::new()),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Search course materials with smart course name matching and lesson filtering"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Run a search and format the matches for the model.
    ///
    /// Search errors are returned as the output text. Only a successful,
    /// non-empty search replaces the recorded sources.
    pub async fn execute(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
    ) -> String {
        let results = self.search.search(query, course_name, lesson_number).await;

        if let Some(error) = results.error {
            return error;
        }

        if results.is_empty() {
            return empty_message(course_name, lesson_number);
        }

        self.format_results(&results).await
    }

    async fn format_results(&self, results: &SearchResults) -> String {
        let mut sections = Vec::with_capacity(results.documents.len());
        let mut sources = Vec::with_capacity(results.documents.len());

        for (document, meta) in results.iter() {
            let header = match meta.lesson_number {
                Some(n) => format!("{} - Lesson {}", meta.course_title, n),
                None => meta.course_title.clone(),
            };
            let url = match meta.lesson_number {
                Some(n) => self.search.get_lesson_link(&meta.course_title, n).await,
                None => None,
            };

            sections.push(format!("[{}]\n{}", header, document));
            sources.push(Source { text: header, url });
        }

        debug!("Recorded {} sources", sources.len());
        *self.lock_sources() = sources;

        sections.join("\n\n")
    }

    fn lock_sources(&self) -> std::sync::MutexGuard<'_, Vec<Source>> {
        self.last_sources.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sources recorded by the last successful search.
    pub fn last_sources(&self) -> Vec<Source> {
        self.lock_sources().clone()
    }

    pub fn reset_sources(&self) {
        self.lock_sources().clear();
    }
}

fn empty_message(course_name: Option<&str>, lesson_number: Option<i64>) -> String {
    let mut message = "No relevant content found".to_string();
    if let Some(course) = course_name {
        message.push_str(&format!(" in course '{}'", course));
    }
    if let Some(n) = lesson_number {
        message.push_str(&format!(" in lesson {}", n));
    }
    message.push('.');
    message
}

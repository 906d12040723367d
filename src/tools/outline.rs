//! Course outline tool.

use super::ToolDefinition;
use crate::error::Result;
use crate::search::CourseSearch;
use crate::vector_store::Course;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(super) struct OutlineArgs {
    pub course_name: String,
}

/// Looks up a course's structure: title, link and lesson list.
pub struct CourseOutlineTool {
    search: Arc<CourseSearch>,
}

impl CourseOutlineTool {
    pub const NAME: &'static str = "get_course_outline";

    pub fn new(search: Arc<CourseSearch>) -> Self {
        Self { search }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Get the outline of a course: title, link and the complete lesson list"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work)"
                    }
                },
                "required": ["course_name"]
            }),
        }
    }

    pub async fn execute(&self, course_name: &str) -> Result<String> {
        let Some(title) = self.search.resolve_course_name(course_name).await else {
            return Ok(format!("No course found matching '{}'", course_name));
        };

        let course = self
            .search
            .get_all_courses_metadata()
            .await?
            .into_iter()
            .find(|c| c.title == title);

        Ok(match course {
            Some(course) => format_outline(&course),
            None => format!("No course found matching '{}'", course_name),
        })
    }
}

/// Render an outline with lessons in stored order.
pub fn format_outline(course: &Course) -> String {
    let mut out = format!("Course: {}\n", course.title);
    if let Some(link) = &course.course_link {
        let _ = writeln!(out, "Course Link: {}", link);
    }
    if let Some(instructor) = &course.instructor {
        let _ = writeln!(out, "Instructor: {}", instructor);
    }
    out.push_str("\nLessons:");
    for lesson in &course.lessons {
        let _ = write!(out, "\n  Lesson {}: {}", lesson.lesson_number, lesson.title);
    }
    out
}

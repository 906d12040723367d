//! Prompt templates for Syllabus.
//!
//! The system preamble can be overridden by placing a `system.toml` file in
//! the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub system: SystemPrompts,
}

/// Instruction preamble and query framing sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemPrompts {
    /// Fixed instructions placed at the top of every model call.
    pub preamble: String,
    /// Template for the user turn; `{{query}}` is replaced by the question.
    pub query: String,
}

impl Default for SystemPrompts {
    fn default() -> Self {
        Self {
            preamble: r#"You are an assistant for course materials and educational content, with tools for looking up course information.

Choosing a tool:
- Use `get_course_outline` for questions about a course's structure, syllabus, lesson list, or the topics it covers. When presenting an outline, give the course title, the course link, and every lesson's number and title.
- Use `search_course_content` for questions about specific material inside lessons.

Using tools:
- You may make up to 2 tool calls per question, one after another (for example an outline first, then a focused content search).
- Base your answer on what the tools return.
- If a tool returns nothing useful, say so plainly and do not suggest alternatives.

Answering:
- General knowledge questions: answer from what you already know, without searching.
- Course-specific questions: search first, then answer.
- Give the answer only. Do not describe your reasoning, your searches, or the type of question, and do not say "based on the search results".

Every answer should be brief, educational, clear, and backed by an example where one helps. Answer exactly what was asked."#
                .to_string(),
            query: "Answer this question about course materials: {{query}}".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, applying overrides from an optional custom directory.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let system_path = custom_path.join("system.toml");
            if system_path.exists() {
                let content = std::fs::read_to_string(&system_path)?;
                prompts.system = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Frame a user question for the model.
    pub fn render_query(&self, query: &str) -> String {
        let mut vars = std::collections::HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        Self::render(&self.system.query, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.system.preamble.contains("search_course_content"));
        assert!(prompts.system.preamble.contains("get_course_outline"));
    }

    #[test]
    fn test_render_query() {
        let prompts = Prompts::default();
        assert_eq!(
            prompts.render_query("What is MCP?"),
            "Answer this question about course materials: What is MCP?"
        );
    }

    #[test]
    fn test_custom_dir_overrides_system() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("system.toml"),
            "preamble = \"Be terse.\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str()).unwrap();
        assert_eq!(prompts.system.preamble, "Be terse.");
        // Unset fields fall back to defaults.
        assert!(prompts.system.query.contains("{{query}}"));
    }
}

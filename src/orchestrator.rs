//! Query orchestrator for Syllabus.
//!
//! Ties the session store, the tool registry and the agent loop together
//! behind a single `query` entry point, and loads course files into the index.

use crate::agent::Agent;
use crate::config::{Prompts, Settings};
use crate::embedding::OpenAIEmbedder;
use crate::error::{Result, SyllabusError};
use crate::llm::{LanguageModel, OpenAIModel};
use crate::search::{ChunkInput, CourseSearch};
use crate::session::{create_session_store, SessionStore};
use crate::tools::{CourseOutlineTool, CourseSearchTool, Source, ToolRegistry};
use crate::vector_store::{create_vector_index, Course};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Answer to a top-level query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

/// Catalog summary.
#[derive(Debug, Clone, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// A course file: catalog fields plus pre-chunked content.
#[derive(Debug, Deserialize)]
pub struct CourseDocument {
    #[serde(flatten)]
    pub course: Course,
    #[serde(default)]
    pub chunks: Vec<ChunkInput>,
}

/// Result of loading course files.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub courses_added: usize,
    pub chunks_added: usize,
    /// Titles already in the catalog, left untouched.
    pub skipped: Vec<String>,
}

/// Top-level query engine.
pub struct Orchestrator {
    prompts: Prompts,
    search: Arc<CourseSearch>,
    registry: ToolRegistry,
    agent: Agent,
    sessions: Arc<dyn SessionStore>,
    /// Tool sources are shared state; one query runs at a time.
    query_lock: Mutex<()>,
}

impl Orchestrator {
    /// Build an orchestrator backed by OpenAI and the configured stores.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;
        let embedder = Arc::new(OpenAIEmbedder::from_settings(settings)?);
        let index = create_vector_index(settings)?;
        let search = Arc::new(CourseSearch::from_settings(settings, index, embedder));
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAIModel::from_settings(settings)?);
        let sessions = create_session_store(settings)?;

        info!(
            "Using model {} with up to {} tool rounds",
            settings.model.name, settings.model.max_tool_rounds
        );

        Ok(Self::with_components(settings, prompts, search, model, sessions))
    }

    /// Build an orchestrator from explicit components.
    pub fn with_components(
        settings: &Settings,
        prompts: Prompts,
        search: Arc<CourseSearch>,
        model: Arc<dyn LanguageModel>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(CourseSearchTool::new(search.clone()));
        registry.register(CourseOutlineTool::new(search.clone()));

        let agent = Agent::new(model, prompts.system.preamble.clone())
            .with_max_rounds(settings.model.max_tool_rounds)
            .with_max_tokens(settings.model.max_tokens);

        Self {
            prompts,
            search,
            registry,
            agent,
            sessions,
            query_lock: Mutex::new(()),
        }
    }

    pub fn search(&self) -> Arc<CourseSearch> {
        self.search.clone()
    }

    /// Answer a question, creating a session when none is given.
    #[instrument(skip(self, text))]
    pub async fn query(&self, text: &str, session_id: Option<&str>) -> Result<QueryResponse> {
        let _guard = self.query_lock.lock().await;

        let session_id = match session_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.sessions.create_session().await?,
        };

        self.registry.reset_sources();

        let history = self.sessions.get_conversation_history(&session_id).await?;
        let prompt = self.prompts.render_query(text);
        let tools = self.registry.get_tool_definitions();

        let result = self
            .agent
            .generate_response(&prompt, history.as_deref(), &tools, Some(&self.registry))
            .await;

        // Drained even on failure so nothing carries into the next query.
        let sources = self.registry.take_sources();
        let response = result?;

        info!(
            "Answered with {} model calls and {} tool calls",
            response.model_calls,
            response.tool_calls.len()
        );

        self.sessions
            .add_exchange(&session_id, text, &response.content)
            .await?;

        Ok(QueryResponse {
            answer: response.content,
            sources,
            session_id,
        })
    }

    /// Course count and titles.
    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.search.existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }

    /// Outline of a course, resolved the same way the model's tool does.
    pub async fn outline(&self, course_name: &str) -> Result<String> {
        CourseOutlineTool::new(self.search.clone())
            .execute(course_name)
            .await
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<()> {
        self.sessions.clear_session(session_id).await
    }

    /// Load a course file, or every `.json` file in a directory.
    pub async fn load_courses(&self, path: &Path) -> Result<LoadSummary> {
        if !path.exists() {
            return Err(SyllabusError::InvalidInput(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }

        let files = if path.is_dir() {
            let mut files: Vec<_> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        let mut existing = self.search.existing_course_titles().await?;
        let mut summary = LoadSummary::default();

        for file in files {
            let document = match read_course_file(&file) {
                Ok(document) => document,
                Err(e) if path.is_dir() => {
                    warn!("Skipping {}: {}", file.display(), e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let title = document.course.title.clone();
            if existing.contains(&title) {
                info!("Course '{}' already loaded, skipping", title);
                summary.skipped.push(title);
                continue;
            }

            summary.chunks_added += self
                .search
                .add_course(&document.course, &document.chunks)
                .await?;
            summary.courses_added += 1;
            existing.push(title);
        }

        Ok(summary)
    }
}

fn read_course_file(path: &Path) -> Result<CourseDocument> {
    let content = std::fs::read_to_string(path)?;
    let document: CourseDocument = serde_json::from_str(&content)?;
    if document.course.title.trim().is_empty() {
        return Err(SyllabusError::InvalidInput(format!(
            "Course in {} has no title",
            path.display()
        )));
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentBlock, ModelResponse, StopReason};
    use crate::session::MemorySessionStore;
    use crate::testing::{fixture_search, KeywordEmbedder, ScriptedModel};
    use crate::vector_store::MemoryVectorIndex;
    use serde_json::json;
    use tempfile::tempdir;

    fn search_call(query: &str) -> ModelResponse {
        ModelResponse {
            stop_reason: StopReason::ToolUse,
            content: vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "search_course_content".to_string(),
                input: json!({"query": query}),
            }],
        }
    }

    async fn orchestrator(model: Arc<ScriptedModel>) -> Orchestrator {
        Orchestrator::with_components(
            &Settings::default(),
            Prompts::default(),
            fixture_search().await,
            model,
            Arc::new(MemorySessionStore::new(2)),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_query_with_new_session() {
        let model = Arc::new(ScriptedModel::new(vec![
            search_call("machine learning"),
            ModelResponse::text_only("Machine learning lets programs learn from data."),
            ModelResponse::text_only("It was covered in lesson 1."),
        ]));
        let orchestrator = orchestrator(model.clone()).await;

        let first = orchestrator
            .query("What is machine learning?", Some(""))
            .await
            .unwrap();
        assert!(!first.session_id.is_empty());
        assert!(!first.answer.is_empty());
        assert!(first
            .sources
            .iter()
            .any(|s| s.text == "Intro to Machine Learning - Lesson 1"
                && s.url.as_deref() == Some("https://example.com/ml/1")));

        let second = orchestrator
            .query("Which lesson was that?", Some(&first.session_id))
            .await
            .unwrap();
        assert_eq!(second.session_id, first.session_id);
        assert!(second.sources.is_empty());

        let requests = model.requests();
        assert_eq!(
            requests[0].messages[0],
            crate::llm::Message::user(
                "Answer this question about course materials: What is machine learning?"
            )
        );
        assert!(requests[2].system.ends_with(
            "Previous conversation:\nUser: What is machine learning?\nAssistant: Machine learning lets programs learn from data."
        ));
    }

    #[tokio::test]
    async fn test_tool_catalog_sent_with_every_round() {
        let model = Arc::new(ScriptedModel::new(vec![ModelResponse::text_only("hi")]));
        let orchestrator = orchestrator(model.clone()).await;
        orchestrator.query("hello", None).await.unwrap();

        let tools = model.requests()[0].tools.clone().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["search_course_content", "get_course_outline"]);
    }

    #[tokio::test]
    async fn test_model_failure_propagates_and_clears_sources() {
        let model = Arc::new(ScriptedModel::new(vec![search_call("ownership")]));
        let orchestrator = orchestrator(model).await;

        let err = orchestrator.query("Explain ownership", None).await.unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
        assert!(orchestrator.registry.get_last_sources().is_empty());
    }

    #[tokio::test]
    async fn test_clear_session_forgets_history() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse::text_only("one"),
            ModelResponse::text_only("two"),
        ]));
        let orchestrator = orchestrator(model.clone()).await;

        let first = orchestrator.query("q1", None).await.unwrap();
        orchestrator.clear_session(&first.session_id).await.unwrap();
        orchestrator
            .query("q2", Some(&first.session_id))
            .await
            .unwrap();

        assert!(!model.requests()[1].system.contains("Previous conversation"));
    }

    #[tokio::test]
    async fn test_course_analytics_and_outline() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let orchestrator = orchestrator(model).await;

        let analytics = orchestrator.course_analytics().await.unwrap();
        assert_eq!(analytics.total_courses, 2);
        assert_eq!(analytics.course_titles[0], "Rust Fundamentals");

        let outline = orchestrator.outline("rust").await.unwrap();
        assert!(outline.starts_with("Course: Rust Fundamentals"));
    }

    #[tokio::test]
    async fn test_load_courses_from_directory_skips_existing() {
        let dir = tempdir().unwrap();
        let course = json!({
            "title": "Building Towards Computer Use",
            "course_link": "https://example.com/computer-use",
            "instructor": "Colt",
            "lessons": [
                {"lesson_number": 0, "title": "Introduction", "lesson_link": "https://example.com/cu/0"},
                {"lesson_number": 1, "title": "Overview"}
            ],
            "chunks": [
                {"lesson_number": 0, "content": "Welcome to the course"},
                {"lesson_number": 1, "content": "An overview of computer use"}
            ]
        });
        std::fs::write(dir.path().join("course1.json"), course.to_string()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let search = Arc::new(CourseSearch::new(
            Arc::new(MemoryVectorIndex::new()),
            Arc::new(KeywordEmbedder),
            5,
        ));
        let orchestrator = Orchestrator::with_components(
            &Settings::default(),
            Prompts::default(),
            search.clone(),
            Arc::new(ScriptedModel::new(vec![])),
            Arc::new(MemorySessionStore::new(2)),
        );

        let summary = orchestrator.load_courses(dir.path()).await.unwrap();
        assert_eq!(summary.courses_added, 1);
        assert_eq!(summary.chunks_added, 2);
        assert!(summary.skipped.is_empty());

        let again = orchestrator.load_courses(dir.path()).await.unwrap();
        assert_eq!(again.courses_added, 0);
        assert_eq!(again.skipped, vec!["Building Towards Computer Use".to_string()]);

        assert_eq!(
            search
                .get_lesson_link("Building Towards Computer Use", 0)
                .await
                .as_deref(),
            Some("https://example.com/cu/0")
        );
    }

    #[tokio::test]
    async fn test_load_missing_path_fails() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let orchestrator = orchestrator(model).await;
        let err = orchestrator
            .load_courses(Path::new("/definitely/not/here.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Path does not exist"));
    }
}

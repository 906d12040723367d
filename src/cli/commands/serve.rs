//! HTTP API server.
//!
//! Exposes the query entry point, the course catalog and session reset as a
//! small JSON API.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::SyllabusError;
use crate::orchestrator::{CourseAnalytics, LoadSummary, Orchestrator, QueryResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Shared application state.
pub struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    load: Option<String>,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Query) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let orchestrator = Orchestrator::new(&settings)?;

    if let Some(load) = load {
        let path = PathBuf::from(shellexpand::tilde(&load).to_string());
        let spinner = Output::spinner(&format!("Indexing {}...", path.display()));
        let summary = preload(&orchestrator, &path).await;
        spinner.finish_and_clear();
        if let Some(summary) = summary {
            Output::success(&format!(
                "Loaded {} courses with {} chunks",
                summary.courses_added, summary.chunks_added
            ));
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(orchestrator).layer(cors);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Syllabus API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Query", "POST   /api/query");
    Output::kv("Courses", "GET    /api/courses");
    Output::kv("Clear session", "DELETE /api/session/{id}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Index course files before serving. A failed load is logged and the server
/// starts with whatever the index already holds.
async fn preload(orchestrator: &Orchestrator, path: &std::path::Path) -> Option<LoadSummary> {
    match orchestrator.load_courses(path).await {
        Ok(summary) => {
            info!(
                "Preloaded {} courses ({} skipped)",
                summary.courses_added,
                summary.skipped.len()
            );
            Some(summary)
        }
        Err(e) => {
            warn!("Could not load courses from {}: {}", path.display(), e);
            Output::warning(&format!("Could not load courses: {}", e));
            None
        }
    }
}

/// Build the API routes around an orchestrator.
pub fn router(orchestrator: Orchestrator) -> Router {
    let state = Arc::new(AppState { orchestrator });

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/courses", get(courses))
        .route("/api/session/{session_id}", delete(clear_session))
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ClearSessionResponse {
    status: &'static str,
    session_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

/// Any failure from the query engine, reported as a 500.
struct ApiError(SyllabusError);

impl From<SyllabusError> for ApiError {
    fn from(e: SyllabusError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                detail: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let response = state
        .orchestrator
        .query(&req.query, req.session_id.as_deref())
        .await?;
    Ok(Json(response))
}

async fn courses(State(state): State<Arc<AppState>>) -> Result<Json<CourseAnalytics>, ApiError> {
    Ok(Json(state.orchestrator.course_analytics().await?))
}

async fn clear_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ClearSessionResponse>, ApiError> {
    state.orchestrator.clear_session(&session_id).await?;
    Ok(Json(ClearSessionResponse {
        status: "cleared",
        session_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::llm::ModelResponse;
    use crate::session::MemorySessionStore;
    use crate::testing::{fixture_search, ScriptedModel};

    async fn state(responses: Vec<ModelResponse>) -> Arc<AppState> {
        let orchestrator = Orchestrator::with_components(
            &Settings::default(),
            Prompts::default(),
            fixture_search().await,
            Arc::new(ScriptedModel::new(responses)),
            Arc::new(MemorySessionStore::new(2)),
        );
        Arc::new(AppState { orchestrator })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_answer_and_session() {
        let state = state(vec![ModelResponse::text_only("An answer.")]).await;
        let response = query(
            State(state),
            Json(QueryRequest {
                query: "What is Rust?".to_string(),
                session_id: None,
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["answer"], "An answer.");
        assert_eq!(body["sources"], serde_json::json!([]));
        assert!(!body["session_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_failure_is_500_with_detail() {
        let state = state(vec![]).await;
        let response = query(
            State(state),
            Json(QueryRequest {
                query: "What is Rust?".to_string(),
                session_id: None,
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("script exhausted"));
    }

    #[tokio::test]
    async fn test_courses_endpoint() {
        let state = state(vec![]).await;
        let response = courses(State(state)).await.into_response();

        let body = body_json(response).await;
        assert_eq!(body["total_courses"], 2);
        assert_eq!(body["course_titles"][1], "Intro to Machine Learning");
    }

    #[tokio::test]
    async fn test_clear_session_endpoint() {
        let state = state(vec![]).await;
        let response = clear_session(State(state), Path("abc".to_string()))
            .await
            .into_response();

        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({"status": "cleared", "session_id": "abc"})
        );
    }

    #[tokio::test]
    async fn test_preload_indexes_courses_before_serving() {
        let dir = tempfile::tempdir().unwrap();
        let course = serde_json::json!({
            "title": "Prompt Compression",
            "lessons": [{"lesson_number": 1, "title": "Why compress"}],
            "chunks": [{"lesson_number": 1, "content": "Shorter prompts cost less"}]
        });
        std::fs::write(dir.path().join("prompt.json"), course.to_string()).unwrap();

        let state = state(vec![]).await;
        let summary = preload(&state.orchestrator, dir.path()).await.unwrap();
        assert_eq!(summary.courses_added, 1);

        let body = body_json(courses(State(state)).await.into_response()).await;
        assert_eq!(body["total_courses"], 3);
    }

    #[tokio::test]
    async fn test_preload_failure_does_not_stop_server() {
        let state = state(vec![]).await;
        let missing = std::path::Path::new("/definitely/not/here");
        assert!(preload(&state.orchestrator, missing).await.is_none());

        let body = body_json(courses(State(state)).await.into_response()).await;
        assert_eq!(body["total_courses"], 2);
    }

    #[test]
    fn test_query_request_accepts_missing_session() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "hi"}"#).unwrap();
        assert_eq!(req.query, "hi");
        assert!(req.session_id.is_none());
    }
}

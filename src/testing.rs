//! Deterministic stand-ins for the embedding API, the chat model and the index.

use crate::embedding::Embedder;
use crate::error::{Result, SyllabusError};
use crate::llm::{LanguageModel, ModelRequest, ModelResponse};
use crate::search::{ChunkInput, CourseSearch};
use crate::vector_store::{
    Course, CourseChunk, CourseMatch, Lesson, MemoryVectorIndex, QueryResults, SearchFilter,
    VectorIndex,
};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const KEYWORD_DIMENSIONS: usize = 1024;

/// Bag-of-words embedder: each lowercase word bumps one hashed dimension.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    fn vectorize(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; KEYWORD_DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() as usize) % KEYWORD_DIMENSIONS] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        KEYWORD_DIMENSIONS
    }
}

/// Keyword embedder whose next batch call fails when armed.
pub struct FlakyEmbedder {
    fail_next_batch: AtomicBool,
}

impl FlakyEmbedder {
    pub fn failing_once() -> Self {
        Self {
            fail_next_batch: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        KeywordEmbedder.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail_next_batch.swap(false, Ordering::SeqCst) {
            return Err(SyllabusError::Embedding("rate limited".to_string()));
        }
        KeywordEmbedder.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        KEYWORD_DIMENSIONS
    }
}

/// Replays queued responses and records every request it receives.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SyllabusError::Model("script exhausted".to_string()))
    }
}

/// Index whose every operation fails as if the backing store were unreachable.
pub struct FailingIndex;

fn unreachable_store<T>() -> Result<T> {
    Err(SyllabusError::VectorStore("connection refused".to_string()))
}

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn add_course(&self, _course: &Course, _title_embedding: &[f32]) -> Result<()> {
        unreachable_store()
    }

    async fn add_chunks(&self, _chunks: &[CourseChunk]) -> Result<usize> {
        unreachable_store()
    }

    async fn query(
        &self,
        _query_embedding: &[f32],
        _filter: Option<&SearchFilter>,
        _n_results: i64,
    ) -> Result<QueryResults> {
        unreachable_store()
    }

    async fn nearest_course(&self, _embedding: &[f32]) -> Result<Option<CourseMatch>> {
        unreachable_store()
    }

    async fn course(&self, _title: &str) -> Result<Option<Course>> {
        unreachable_store()
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        unreachable_store()
    }

    async fn chunk_count(&self) -> Result<usize> {
        unreachable_store()
    }

    async fn clear(&self) -> Result<()> {
        unreachable_store()
    }
}

pub fn rust_course() -> (Course, Vec<ChunkInput>) {
    let course = Course {
        title: "Rust Fundamentals".to_string(),
        course_link: Some("https://example.com/rust".to_string()),
        instructor: Some("Ferris".to_string()),
        lessons: vec![
            Lesson {
                lesson_number: 1,
                title: "Ownership".to_string(),
                lesson_link: Some("https://example.com/rust/1".to_string()),
            },
            Lesson {
                lesson_number: 2,
                title: "Traits".to_string(),
                lesson_link: None,
            },
        ],
    };
    let chunks = vec![
        ChunkInput {
            lesson_number: Some(1),
            content: "Rust ownership and borrowing rules keep memory safe".to_string(),
        },
        ChunkInput {
            lesson_number: Some(2),
            content: "Traits describe shared behavior for generic code".to_string(),
        },
    ];
    (course, chunks)
}

pub fn ml_course() -> (Course, Vec<ChunkInput>) {
    let course = Course {
        title: "Intro to Machine Learning".to_string(),
        course_link: None,
        instructor: None,
        lessons: vec![Lesson {
            lesson_number: 1,
            title: "What is machine learning".to_string(),
            lesson_link: Some("https://example.com/ml/1".to_string()),
        }],
    };
    let chunks = vec![ChunkInput {
        lesson_number: Some(1),
        content: "Machine learning lets programs learn patterns from data".to_string(),
    }];
    (course, chunks)
}

/// Search layer over two small courses with the default cap.
pub async fn fixture_search() -> Arc<CourseSearch> {
    fixture_search_with_cap(5).await
}

/// Search layer over the fixture courses with an explicit result cap.
pub async fn fixture_search_with_cap(max_results: i64) -> Arc<CourseSearch> {
    let search = CourseSearch::new(
        Arc::new(MemoryVectorIndex::new()),
        Arc::new(KeywordEmbedder),
        max_results,
    );
    for (course, chunks) in [rust_course(), ml_course()] {
        search.add_course(&course, &chunks).await.unwrap();
    }
    Arc::new(search)
}

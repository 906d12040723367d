//! Vector index abstraction for Syllabus.
//!
//! Holds two collections: a course catalog (one entry per course, embedded by
//! title) and the chunked course content. Backends only rank by embedding and
//! apply metadata filters; course-name resolution and result formatting live
//! in the search layer.

mod memory;
mod sqlite;

pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

use crate::config::{Settings, StoreProvider};
use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// A lesson within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: i64,
    pub title: String,
    #[serde(default)]
    pub lesson_link: Option<String>,
}

/// Catalog entry for a course. The title is the canonical course identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    #[serde(default)]
    pub course_link: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Look up a lesson by number.
    pub fn lesson(&self, lesson_number: i64) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }
}

/// Metadata stored alongside each content chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: i64,
}

/// A chunk of course content with its embedding.
#[derive(Debug, Clone)]
pub struct CourseChunk {
    pub id: Uuid,
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

impl CourseChunk {
    /// Create a new chunk. The id is derived from the course title and chunk
    /// index, so reloading a course overwrites its earlier chunks.
    pub fn new(
        course_title: String,
        lesson_number: Option<i64>,
        chunk_index: i64,
        content: String,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Self::chunk_id(&course_title, chunk_index),
            course_title,
            lesson_number,
            chunk_index,
            content,
            embedding,
        }
    }

    fn chunk_id(course_title: &str, chunk_index: i64) -> Uuid {
        let name = format!("{}#{}", course_title, chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            course_title: self.course_title.clone(),
            lesson_number: self.lesson_number,
            chunk_index: self.chunk_index,
        }
    }
}

/// Metadata predicate applied before ranking.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFilter {
    /// Chunk belongs to the course with this canonical title.
    Course(String),
    /// Chunk belongs to this lesson number.
    Lesson(i64),
    /// Every inner filter must match.
    And(Vec<SearchFilter>),
}

impl SearchFilter {
    /// Check a chunk's metadata against the filter.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        match self {
            SearchFilter::Course(title) => metadata.course_title == *title,
            SearchFilter::Lesson(n) => metadata.lesson_number == Some(*n),
            SearchFilter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

/// Raw index response: parallel sequences ordered by ascending distance.
#[derive(Debug, Clone, Default)]
pub struct QueryResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
}

/// Nearest catalog entry for a course-name query.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseMatch {
    pub title: String,
    pub distance: f32,
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add or replace a course catalog entry.
    async fn add_course(&self, course: &Course, title_embedding: &[f32]) -> Result<()>;

    /// Add content chunks.
    async fn add_chunks(&self, chunks: &[CourseChunk]) -> Result<usize>;

    /// Rank content chunks by distance to the query embedding.
    ///
    /// `n_results` must be positive; anything else is rejected with an error.
    async fn query(
        &self,
        query_embedding: &[f32],
        filter: Option<&SearchFilter>,
        n_results: i64,
    ) -> Result<QueryResults>;

    /// Find the catalog entry whose title embedding is nearest.
    async fn nearest_course(&self, embedding: &[f32]) -> Result<Option<CourseMatch>>;

    /// Get a course catalog entry by exact title.
    async fn course(&self, title: &str) -> Result<Option<Course>>;

    /// Get all catalog entries in insertion order.
    async fn courses(&self) -> Result<Vec<Course>>;

    /// Get total chunk count.
    async fn chunk_count(&self) -> Result<usize>;

    /// Remove all catalog entries and chunks.
    async fn clear(&self) -> Result<()>;
}

/// Open the vector index selected in settings.
pub fn create_vector_index(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
    debug!("Opening {} vector index", settings.vector_store.provider);
    let index: Arc<dyn VectorIndex> = match settings.vector_store.provider {
        StoreProvider::Memory => Arc::new(MemoryVectorIndex::new()),
        StoreProvider::Sqlite => Arc::new(SqliteVectorIndex::new(&settings.vector_store_path())?),
    };
    Ok(index)
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance: 0 for identical direction, 2 for opposite.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Validate a result cap, rejecting zero and negative values.
pub(crate) fn validate_n_results(n_results: i64) -> Result<usize> {
    if n_results <= 0 {
        return Err(SyllabusError::VectorStore(format!(
            "Number of requested results {}, cannot be negative, or zero.",
            n_results
        )));
    }
    Ok(n_results as usize)
}

/// Filter, rank and truncate candidate chunks into a query response.
pub(crate) fn rank_chunks<I>(
    query_embedding: &[f32],
    chunks: I,
    filter: Option<&SearchFilter>,
    limit: usize,
) -> QueryResults
where
    I: IntoIterator<Item = (String, ChunkMetadata, Vec<f32>)>,
{
    let mut scored: Vec<(String, ChunkMetadata, f32)> = chunks
        .into_iter()
        .filter(|(_, metadata, _)| filter.map_or(true, |f| f.matches(metadata)))
        .map(|(content, metadata, embedding)| {
            let distance = cosine_distance(query_embedding, &embedding);
            (content, metadata, distance)
        })
        .collect();

    scored.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    let mut results = QueryResults::default();
    for (content, metadata, distance) in scored {
        results.documents.push(content);
        results.metadata.push(metadata);
        results.distances.push(distance);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(course: &str, lesson: Option<i64>) -> ChunkMetadata {
        ChunkMetadata {
            course_title: course.to_string(),
            lesson_number: lesson,
            chunk_index: 0,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_distance(&a, &d) - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_filter_matches() {
        let both = SearchFilter::And(vec![
            SearchFilter::Course("Rust 101".to_string()),
            SearchFilter::Lesson(2),
        ]);

        assert!(both.matches(&meta("Rust 101", Some(2))));
        assert!(!both.matches(&meta("Rust 101", Some(3))));
        assert!(!both.matches(&meta("Go 101", Some(2))));
        assert!(!SearchFilter::Lesson(1).matches(&meta("Rust 101", None)));
    }

    #[test]
    fn test_validate_n_results() {
        assert_eq!(validate_n_results(5).unwrap(), 5);
        let err = validate_n_results(0).unwrap_err().to_string();
        assert!(err.contains("cannot be negative, or zero"));
        assert!(validate_n_results(-3).is_err());
    }

    #[test]
    fn test_rank_chunks_orders_and_truncates() {
        let chunks = vec![
            ("far".to_string(), meta("A", Some(1)), vec![0.0, 1.0]),
            ("near".to_string(), meta("A", Some(1)), vec![1.0, 0.0]),
            ("filtered".to_string(), meta("B", Some(1)), vec![1.0, 0.0]),
        ];
        let filter = SearchFilter::Course("A".to_string());

        let results = rank_chunks(&[1.0, 0.0], chunks, Some(&filter), 1);
        assert_eq!(results.documents, vec!["near".to_string()]);
        assert!(results.distances[0].abs() < 0.001);
    }
}

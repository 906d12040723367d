//! Semantic search over course content.
//!
//! Wraps a [`VectorIndex`] and an [`Embedder`]: resolves fuzzy course names to
//! catalog titles, builds metadata filters, and normalizes every outcome into
//! [`SearchResults`]. Searches never fail; index and embedding errors become
//! error results so callers can tell "no matches" apart from "broken".

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{
    ChunkMetadata, Course, CourseChunk, QueryResults, SearchFilter, VectorIndex,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Normalized search response.
///
/// Invariant: when `error` is set, there are no documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
    pub error: Option<String>,
}

impl SearchResults {
    /// Wrap a raw index response.
    pub fn from_query(results: QueryResults) -> Self {
        Self {
            documents: results.documents,
            metadata: results.metadata,
            distances: results.distances,
            error: None,
        }
    }

    /// A result carrying only an error message.
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// True when there are no documents, whether or not an error is set.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents paired with their metadata, best match first.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ChunkMetadata)> {
        self.documents.iter().zip(self.metadata.iter())
    }
}

/// A chunk of course text as supplied to [`CourseSearch::add_course`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChunkInput {
    #[serde(default)]
    pub lesson_number: Option<i64>,
    pub content: String,
}

/// Semantic search layer shared by the tools.
pub struct CourseSearch {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    max_results: i64,
    max_course_distance: Option<f32>,
}

impl CourseSearch {
    /// Create a search layer returning at most `max_results` chunks per query.
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, max_results: i64) -> Self {
        Self {
            index,
            embedder,
            max_results,
            max_course_distance: None,
        }
    }

    /// Create a search layer using the limits from settings.
    pub fn from_settings(
        settings: &Settings,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self::new(index, embedder, settings.search.max_results)
            .with_max_course_distance(settings.search.max_course_distance)
    }

    /// Reject course-name matches farther than `distance` from the query.
    pub fn with_max_course_distance(mut self, distance: Option<f32>) -> Self {
        self.max_course_distance = distance;
        self
    }

    /// Search course content, optionally restricted to a course and/or lesson.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
    ) -> SearchResults {
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await {
                Some(title) => Some(title),
                None => return SearchResults::empty(format!("No course found matching '{}'", name)),
            },
            None => None,
        };

        let filter = Self::build_filter(course_title.as_deref(), lesson_number);

        match self.query_index(query, filter.as_ref()).await {
            Ok(results) => {
                debug!("Search returned {} documents", results.documents.len());
                SearchResults::from_query(results)
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                SearchResults::empty(format!("Search error: {}", e))
            }
        }
    }

    async fn query_index(&self, query: &str, filter: Option<&SearchFilter>) -> Result<QueryResults> {
        let embedding = self.embedder.embed(query).await?;
        self.index.query(&embedding, filter, self.max_results).await
    }

    /// Resolve a possibly partial course name to a catalog title.
    ///
    /// A case-insensitive exact title wins; otherwise the catalog entry whose
    /// title embedding is nearest is used.
    #[instrument(skip(self))]
    pub async fn resolve_course_name(&self, course_name: &str) -> Option<String> {
        match self.try_resolve_course_name(course_name).await {
            Ok(title) => title,
            Err(e) => {
                warn!("Course resolution failed for '{}': {}", course_name, e);
                None
            }
        }
    }

    async fn try_resolve_course_name(&self, course_name: &str) -> Result<Option<String>> {
        let wanted = course_name.trim().to_lowercase();
        if let Some(course) = self
            .index
            .courses()
            .await?
            .into_iter()
            .find(|c| c.title.to_lowercase() == wanted)
        {
            return Ok(Some(course.title));
        }

        let embedding = self.embedder.embed(course_name).await?;
        let Some(nearest) = self.index.nearest_course(&embedding).await? else {
            return Ok(None);
        };

        if let Some(max) = self.max_course_distance {
            if nearest.distance > max {
                debug!(
                    "Nearest course '{}' at distance {:.3} exceeds {:.3}",
                    nearest.title, nearest.distance, max
                );
                return Ok(None);
            }
        }

        Ok(Some(nearest.title))
    }

    /// Build the metadata filter for a resolved course title and lesson number.
    pub fn build_filter(course_title: Option<&str>, lesson_number: Option<i64>) -> Option<SearchFilter> {
        match (course_title, lesson_number) {
            (None, None) => None,
            (Some(title), None) => Some(SearchFilter::Course(title.to_string())),
            (None, Some(n)) => Some(SearchFilter::Lesson(n)),
            (Some(title), Some(n)) => Some(SearchFilter::And(vec![
                SearchFilter::Course(title.to_string()),
                SearchFilter::Lesson(n),
            ])),
        }
    }

    /// Link for a lesson, if the catalog records one.
    pub async fn get_lesson_link(&self, course_title: &str, lesson_number: i64) -> Option<String> {
        match self.index.course(course_title).await {
            Ok(course) => course?.lesson(lesson_number)?.lesson_link.clone(),
            Err(e) => {
                warn!("Lesson link lookup failed: {}", e);
                None
            }
        }
    }

    /// Link for a course, if the catalog records one.
    pub async fn get_course_link(&self, course_title: &str) -> Option<String> {
        match self.index.course(course_title).await {
            Ok(course) => course?.course_link,
            Err(e) => {
                warn!("Course link lookup failed: {}", e);
                None
            }
        }
    }

    /// Full catalog, including lesson lists.
    pub async fn get_all_courses_metadata(&self) -> Result<Vec<Course>> {
        self.index.courses().await
    }

    /// Number of courses in the catalog.
    pub async fn course_count(&self) -> Result<usize> {
        Ok(self.index.courses().await?.len())
    }

    /// Titles of all cataloged courses.
    pub async fn existing_course_titles(&self) -> Result<Vec<String>> {
        Ok(self.index.courses().await?.into_iter().map(|c| c.title).collect())
    }

    /// Remove every course and chunk.
    pub async fn clear(&self) -> Result<()> {
        self.index.clear().await
    }

    /// Embed and store a course and its chunks. Returns the number of chunks stored.
    ///
    /// A course whose title is already cataloged is left as is and stores nothing.
    #[instrument(skip(self, course, chunks), fields(title = %course.title))]
    pub async fn add_course(&self, course: &Course, chunks: &[ChunkInput]) -> Result<usize> {
        if self.index.course(&course.title).await?.is_some() {
            info!("Course '{}' already indexed", course.title);
            return Ok(0);
        }

        // Embed everything before writing: the catalog entry marks a course as
        // loaded, so it goes in last.
        let title_embedding = self.embedder.embed(&course.title).await?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let stored: Vec<CourseChunk> = chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (chunk, embedding))| {
                CourseChunk::new(
                    course.title.clone(),
                    chunk.lesson_number,
                    i as i64,
                    chunk.content.clone(),
                    embedding,
                )
            })
            .collect();

        let count = self.index.add_chunks(&stored).await?;
        self.index.add_course(course, &title_embedding).await?;
        info!("Indexed course '{}' with {} chunks", course.title, count);
        Ok(count)
    }
}

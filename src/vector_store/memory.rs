//! In-memory vector index implementation.
//!
//! Useful for testing and small course collections.

use super::{
    cosine_distance, rank_chunks, validate_n_results, Course, CourseChunk, CourseMatch,
    QueryResults, SearchFilter, VectorIndex,
};
use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct IndexState {
    catalog: Vec<(Course, Vec<f32>)>,
    chunks: Vec<CourseChunk>,
}

/// In-memory vector index.
#[derive(Default)]
pub struct MemoryVectorIndex {
    state: RwLock<IndexState>,
}

impl MemoryVectorIndex {
    /// Create a new in-memory vector index.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexState>> {
        self.state
            .read()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexState>> {
        self.state
            .write()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn add_course(&self, course: &Course, title_embedding: &[f32]) -> Result<()> {
        let mut state = self.write()?;
        let entry = (course.clone(), title_embedding.to_vec());
        match state.catalog.iter().position(|(c, _)| c.title == course.title) {
            Some(i) => state.catalog[i] = entry,
            None => state.catalog.push(entry),
        }
        Ok(())
    }

    async fn add_chunks(&self, chunks: &[CourseChunk]) -> Result<usize> {
        let mut state = self.write()?;
        for chunk in chunks {
            match state.chunks.iter().position(|c| c.id == chunk.id) {
                Some(i) => state.chunks[i] = chunk.clone(),
                None => state.chunks.push(chunk.clone()),
            }
        }
        Ok(chunks.len())
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        filter: Option<&SearchFilter>,
        n_results: i64,
    ) -> Result<QueryResults> {
        let limit = validate_n_results(n_results)?;
        let state = self.read()?;

        let candidates = state
            .chunks
            .iter()
            .map(|c| (c.content.clone(), c.metadata(), c.embedding.clone()));

        Ok(rank_chunks(query_embedding, candidates, filter, limit))
    }

    async fn nearest_course(&self, embedding: &[f32]) -> Result<Option<CourseMatch>> {
        let state = self.read()?;

        let nearest = state
            .catalog
            .iter()
            .map(|(course, title_embedding)| CourseMatch {
                title: course.title.clone(),
                distance: cosine_distance(embedding, title_embedding),
            })
            .min_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        Ok(nearest)
    }

    async fn course(&self, title: &str) -> Result<Option<Course>> {
        let state = self.read()?;
        Ok(state
            .catalog
            .iter()
            .find(|(c, _)| c.title == title)
            .map(|(c, _)| c.clone()))
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        let state = self.read()?;
        Ok(state.catalog.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.read()?.chunks.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.write()?;
        state.catalog.clear();
        state.chunks.clear();
        Ok(())
    }
}

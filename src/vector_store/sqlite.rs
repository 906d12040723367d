//! SQLite-based vector index implementation.
//!
//! Embeddings are stored as little-endian `f32` blobs and ranked in Rust.
//! Metadata filters are pushed down into the SQL `WHERE` clause so only
//! candidate chunks are decoded.

use super::{
    cosine_distance, rank_chunks, validate_n_results, ChunkMetadata, Course, CourseChunk,
    CourseMatch, Lesson, QueryResults, SearchFilter, VectorIndex,
};
use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS courses (
        title TEXT PRIMARY KEY,
        course_link TEXT,
        instructor TEXT,
        lessons_json TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        course_title TEXT NOT NULL,
        lesson_number INTEGER,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_course ON chunks(course_title, lesson_number);
"#;

/// SQLite-based vector index.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

impl SqliteVectorIndex {
    /// Open (or create) a vector index at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn course_from_row(
        title: String,
        course_link: Option<String>,
        instructor: Option<String>,
        lessons_json: &str,
    ) -> Result<Course> {
        let lessons: Vec<Lesson> = serde_json::from_str(lessons_json).map_err(|e| {
            SyllabusError::VectorStore(format!("Corrupt lesson list for '{}': {}", title, e))
        })?;
        Ok(Course {
            title,
            course_link,
            instructor,
            lessons,
        })
    }
}

/// Translate a filter into a SQL predicate, appending its bound values.
fn filter_clause(filter: &SearchFilter, values: &mut Vec<Value>) -> String {
    match filter {
        SearchFilter::Course(title) => {
            values.push(Value::Text(title.clone()));
            format!("course_title = ?{}", values.len())
        }
        SearchFilter::Lesson(n) => {
            values.push(Value::Integer(*n));
            format!("lesson_number = ?{}", values.len())
        }
        SearchFilter::And(filters) if filters.is_empty() => "1 = 1".to_string(),
        SearchFilter::And(filters) => {
            let parts: Vec<String> = filters.iter().map(|f| filter_clause(f, values)).collect();
            format!("({})", parts.join(" AND "))
        }
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    #[instrument(skip(self, course, title_embedding), fields(title = %course.title))]
    async fn add_course(&self, course: &Course, title_embedding: &[f32]) -> Result<()> {
        let conn = self.lock()?;
        let lessons_json = serde_json::to_string(&course.lessons)?;

        conn.execute(
            r#"
            INSERT INTO courses (title, course_link, instructor, lessons_json, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(title) DO UPDATE SET
                course_link = excluded.course_link,
                instructor = excluded.instructor,
                lessons_json = excluded.lessons_json,
                embedding = excluded.embedding,
                indexed_at = excluded.indexed_at
            "#,
            params![
                course.title,
                course.course_link,
                course.instructor,
                lessons_json,
                Self::embedding_to_bytes(title_embedding),
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!("Stored catalog entry");
        Ok(())
    }

    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn add_chunks(&self, chunks: &[CourseChunk]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for chunk in chunks {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO chunks
                (id, course_title, lesson_number, chunk_index, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    chunk.id.to_string(),
                    chunk.course_title,
                    chunk.lesson_number,
                    chunk.chunk_index,
                    chunk.content,
                    Self::embedding_to_bytes(&chunk.embedding),
                ],
            )?;
        }

        tx.commit()?;
        info!("Stored {} chunks", chunks.len());
        Ok(chunks.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn query(
        &self,
        query_embedding: &[f32],
        filter: Option<&SearchFilter>,
        n_results: i64,
    ) -> Result<QueryResults> {
        let limit = validate_n_results(n_results)?;
        let conn = self.lock()?;

        let mut values = Vec::new();
        let where_clause = match filter {
            Some(f) => format!("WHERE {}", filter_clause(f, &mut values)),
            None => String::new(),
        };

        let sql = format!(
            "SELECT content, course_title, lesson_number, chunk_index, embedding FROM chunks {}",
            where_clause
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            Ok((
                row.get::<_, String>(0)?,
                ChunkMetadata {
                    course_title: row.get(1)?,
                    lesson_number: row.get(2)?,
                    chunk_index: row.get(3)?,
                },
                Self::bytes_to_embedding(&embedding_bytes),
            ))
        })?;

        let candidates = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        let results = rank_chunks(query_embedding, candidates, None, limit);

        debug!("Found {} matching chunks", results.documents.len());
        Ok(results)
    }

    #[instrument(skip(self, embedding))]
    async fn nearest_course(&self, embedding: &[f32]) -> Result<Option<CourseMatch>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT title, embedding FROM courses")?;

        let rows = stmt.query_map([], |row| {
            let title: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((title, bytes))
        })?;

        let mut nearest: Option<CourseMatch> = None;
        for row in rows {
            let (title, bytes) = row?;
            let distance = cosine_distance(embedding, &Self::bytes_to_embedding(&bytes));
            if nearest.as_ref().map_or(true, |n| distance < n.distance) {
                nearest = Some(CourseMatch { title, distance });
            }
        }

        Ok(nearest)
    }

    #[instrument(skip(self))]
    async fn course(&self, title: &str) -> Result<Option<Course>> {
        let conn = self.lock()?;

        let row = conn.query_row(
            "SELECT title, course_link, instructor, lessons_json FROM courses WHERE title = ?1",
            params![title],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        );

        match row {
            Ok((title, link, instructor, lessons)) => {
                Ok(Some(Self::course_from_row(title, link, instructor, &lessons)?))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn courses(&self) -> Result<Vec<Course>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT title, course_link, instructor, lessons_json FROM courses ORDER BY rowid",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut courses = Vec::new();
        for row in rows {
            let (title, link, instructor, lessons) = row?;
            courses.push(Self::course_from_row(title, link, instructor, &lessons)?);
        }
        Ok(courses)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM chunks; DELETE FROM courses;")?;
        info!("Cleared vector index");
        Ok(())
    }
}

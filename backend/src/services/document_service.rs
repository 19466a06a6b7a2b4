//! RAG document ingestion and vector search.
//!
//! Documents live in MongoDB; their chunks and embeddings live in the
//! Postgres `document_chunks` table. Deleting a document removes its chunks
//! in the same operation.

use bson::doc;
use futures::TryStreamExt;
use pgvector::Vector;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::MongoStore;
use crate::error::{AppError, Result};
use crate::models::document::{Document, DocumentChunkRow};
use crate::services::gemini::GeminiClient;

/// Chunk size in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Overlap between consecutive chunks in characters.
pub const CHUNK_OVERLAP: usize = 200;

/// Default number of hits returned by a query.
pub const DEFAULT_TOP_K: i64 = 5;

/// A chunk boundary in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub index: i32,
    pub start: i32,
    pub end: i32,
}

/// One ranked search hit.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ChunkHit {
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    pub chunk_index: i32,
    /// Cosine similarity in [-1, 1]; higher is closer.
    pub similarity: f64,
}

#[derive(sqlx::FromRow)]
struct HitRow {
    document_id: String,
    content: String,
    chunk_index: i32,
    distance: f64,
}

pub struct DocumentService {
    db: PgPool,
    mongo: MongoStore,
}

impl DocumentService {
    pub fn new(db: PgPool, mongo: MongoStore) -> Self {
        Self { db, mongo }
    }

    /// Store a document, chunk it, embed every chunk, and persist the
    /// vectors. The document is only marked processed once all chunks are in.
    pub async fn ingest(
        &self,
        user_id: &str,
        gemini: &GeminiClient,
        title: String,
        content: String,
        metadata: serde_json::Map<String, serde_json::Value>,
        is_public: bool,
    ) -> Result<Document> {
        if title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if content.trim().is_empty() {
            return Err(AppError::Validation("content is required".to_string()));
        }

        let mut document = Document::new(
            user_id.to_string(),
            title.trim().to_string(),
            content,
            metadata,
            is_public,
        );
        self.mongo.documents().insert_one(&document).await?;

        let chunks = chunk_text(&document.content, CHUNK_SIZE, CHUNK_OVERLAP);
        tracing::info!(document_id = %document.id, chunks = chunks.len(), "Embedding document chunks");

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = gemini.embed_batch(&texts).await?;

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            sqlx::query(
                r#"
                INSERT INTO document_chunks
                    (id, document_id, user_id, content, chunk_index, start_idx, end_idx, embedding)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&document.id)
            .bind(user_id)
            .bind(&chunk.content)
            .bind(chunk.index)
            .bind(chunk.start)
            .bind(chunk.end)
            .bind(Vector::from(embedding))
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        document.chunk_count = chunks.len() as i64;
        document.is_processed = true;
        document.updated_at = bson::DateTime::now();
        self.mongo
            .documents()
            .update_one(
                doc! {"_id": &document.id},
                doc! {"$set": {
                    "chunk_count": document.chunk_count,
                    "is_processed": true,
                    "updated_at": document.updated_at,
                }},
            )
            .await?;

        Ok(document)
    }

    pub async fn list(
        &self,
        user_id: &str,
        offset: u64,
        limit: i64,
    ) -> Result<(Vec<Document>, u64)> {
        let filter = doc! {"user_id": user_id};
        let total = self.mongo.documents().count_documents(filter.clone()).await?;
        let cursor = self
            .mongo
            .documents()
            .find(filter)
            .sort(doc! {"created_at": -1})
            .skip(offset)
            .limit(limit)
            .await?;
        Ok((cursor.try_collect().await?, total))
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<Document> {
        self.mongo
            .documents()
            .find_one(doc! {"_id": id, "user_id": user_id})
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))
    }

    /// The stored chunk rows for a document, in order. Ownership is checked
    /// through the Mongo document first.
    pub async fn list_chunks(&self, user_id: &str, id: &str) -> Result<Vec<DocumentChunkRow>> {
        self.get(user_id, id).await?;
        let rows: Vec<DocumentChunkRow> = sqlx::query_as(
            r#"
            SELECT id, document_id, user_id, content, chunk_index, start_idx, end_idx,
                   section_title, embedding, created_at
            FROM document_chunks
            WHERE document_id = $1
            ORDER BY chunk_index
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows)
    }

    /// Delete the document and cascade to its chunk rows.
    pub async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        let result = self
            .mongo
            .documents()
            .delete_one(doc! {"_id": id, "user_id": user_id})
            .await?;
        if result.deleted_count == 0 {
            return Err(AppError::NotFound("Document not found".to_string()));
        }

        sqlx::query("DELETE FROM document_chunks WHERE document_id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Cosine top-k over the caller's own chunks plus chunks of public
    /// documents.
    pub async fn query(
        &self,
        user_id: &str,
        gemini: &GeminiClient,
        query: &str,
        top_k: Option<i64>,
    ) -> Result<Vec<ChunkHit>> {
        if query.trim().is_empty() {
            return Err(AppError::Validation("query is required".to_string()));
        }
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K).clamp(1, 50);

        let embedding = gemini.embed(query).await?;

        // Public documents are tracked in Mongo, so resolve their ids first.
        let mut public_ids: Vec<String> = Vec::new();
        let mut cursor = self
            .mongo
            .documents()
            .find(doc! {"is_public": true, "is_processed": true})
            .await?;
        while let Some(document) = cursor.try_next().await? {
            public_ids.push(document.id);
        }

        let rows: Vec<HitRow> = sqlx::query_as(
            r#"
            SELECT document_id, content, chunk_index,
                   (embedding <=> $1)::float8 AS distance
            FROM document_chunks
            WHERE embedding IS NOT NULL
              AND (user_id = $2 OR document_id = ANY($3))
            ORDER BY embedding <=> $1
            LIMIT $4
            "#,
        )
        .bind(Vector::from(embedding))
        .bind(user_id)
        .bind(&public_ids)
        .bind(top_k)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        // Resolve titles for the documents that produced hits.
        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let title = self
                .mongo
                .documents()
                .find_one(doc! {"_id": &row.document_id})
                .await?
                .map(|d| d.title)
                .unwrap_or_default();
            hits.push(ChunkHit {
                document_id: row.document_id,
                document_title: title,
                content: row.content,
                chunk_index: row.chunk_index,
                similarity: 1.0 - row.distance,
            });
        }
        Ok(hits)
    }
}

/// Split text into overlapping character windows, preferring to break on
/// whitespace. Offsets are char-based; slicing never lands inside a UTF-8
/// code point.
pub fn chunk_text(text: &str, max_size: usize, overlap: usize) -> Vec<Chunk> {
    assert!(overlap < max_size, "overlap must be smaller than chunk size");

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0i32;

    while start < total {
        let hard_end = (start + max_size).min(total);
        let end = if hard_end < total {
            // Back up to the last whitespace inside the window, if any.
            match chars[start..hard_end]
                .iter()
                .rposition(|c| c.is_whitespace())
            {
                Some(pos) if start + pos > start + max_size / 2 => start + pos,
                _ => hard_end,
            }
        } else {
            hard_end
        };

        let content: String = chars[start..end].iter().collect();
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                content: trimmed.to_string(),
                index,
                start: start as i32,
                end: end as i32,
            });
            index += 1;
        }

        if end >= total {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("hello world", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].end, 11);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("   ", 1000, 200).is_empty());
    }

    #[test]
    fn test_chunks_respect_max_size() {
        let text = "word ".repeat(1000);
        let chunks = chunk_text(&text, 1000, 200);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 1000);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = "word ".repeat(1000);
        let chunks = chunk_text(&text, 1000, 200);
        for pair in chunks.windows(2) {
            // Next chunk starts before the previous one ends.
            assert!(pair[1].start < pair[0].end);
        }
    }

    #[test]
    fn test_chunks_cover_full_input() {
        let text = "word ".repeat(1000);
        let chunks = chunk_text(&text, 1000, 200);
        assert_eq!(chunks.first().unwrap().start, 0);
        // Last chunk reaches the end (modulo trailing whitespace trim).
        assert!(chunks.last().unwrap().end as usize >= text.trim_end().chars().count());
    }

    #[test]
    fn test_multibyte_text_never_panics() {
        let text = "héllo wörld 日本語のテキスト ".repeat(200);
        let chunks = chunk_text(&text, 100, 20);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 100);
        }
    }

    #[test]
    fn test_prefers_word_boundaries() {
        let text = format!("{} {}", "a".repeat(600), "b".repeat(600));
        let chunks = chunk_text(&text, 1000, 200);
        // First window's soft break lands on the space after the a-run.
        assert_eq!(chunks[0].content, "a".repeat(600));
    }

    #[test]
    #[should_panic(expected = "overlap must be smaller")]
    fn test_overlap_must_be_smaller_than_size() {
        chunk_text("text", 100, 100);
    }
}

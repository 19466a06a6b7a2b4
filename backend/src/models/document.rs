//! RAG documents: Mongo holds the source document, Postgres holds the
//! embedded chunks (`document_chunks` table, `vector(768)` column).

use bson::DateTime;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub chunk_count: i64,
    #[serde(default)]
    pub is_processed: bool,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Document {
    pub fn new(
        user_id: String,
        title: String,
        content: String,
        metadata: serde_json::Map<String, serde_json::Value>,
        is_public: bool,
    ) -> Self {
        let now = DateTime::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            title,
            content,
            metadata,
            chunk_count: 0,
            is_processed: false,
            is_public,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A chunk row in Postgres, embedding included.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentChunkRow {
    pub id: Uuid,
    pub document_id: String,
    pub user_id: String,
    pub content: String,
    pub chunk_index: i32,
    pub start_idx: i32,
    pub end_idx: i32,
    pub section_title: Option<String>,
    pub embedding: Option<pgvector::Vector>,
    pub created_at: chrono::DateTime<Utc>,
}

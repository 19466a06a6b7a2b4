//! RAG document API handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::auth::AuthExtension;
use crate::api::{charge_usage, gemini_for_user, SharedState};
use crate::error::Result;
use crate::models::document::{Document, DocumentChunkRow};
use crate::services::document_service::{ChunkHit, DocumentService};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/documents", get(list_documents).post(create_document))
        .route(
            "/documents/:id",
            get(get_document).delete(delete_document),
        )
        .route("/query", post(query_documents))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DocumentResponse {
    pub id: String,
    pub title: String,
    pub chunk_count: i64,
    pub is_processed: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            title: document.title,
            chunk_count: document.chunk_count,
            is_processed: document.is_processed,
            is_public: document.is_public,
            created_at: document.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ChunkResponse {
    pub chunk_index: i32,
    pub content: String,
    pub start_idx: i32,
    pub end_idx: i32,
    pub has_embedding: bool,
}

impl From<DocumentChunkRow> for ChunkResponse {
    fn from(row: DocumentChunkRow) -> Self {
        Self {
            chunk_index: row.chunk_index,
            content: row.content,
            start_idx: row.start_idx,
            end_idx: row.end_idx,
            has_embedding: row.embedding.is_some(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DocumentDetailResponse {
    #[serde(flatten)]
    pub document: DocumentResponse,
    pub chunks: Vec<ChunkResponse>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DocumentListResponse {
    pub items: Vec<DocumentResponse>,
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<i64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QueryResponse {
    pub hits: Vec<ChunkHit>,
}

/// POST /api/v1/rag/documents
#[utoipa::path(
    post,
    path = "/api/v1/rag/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document ingested and embedded", body = DocumentResponse),
        (status = 502, description = "Embedding provider failure"),
    ),
    security(("bearer_auth" = [])),
    tag = "rag"
)]
pub async fn create_document(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>)> {
    let (gemini, metered) = gemini_for_user(&state, &auth.user).await?;
    let service = DocumentService::new(state.db.clone(), state.mongo.clone());
    let document = service
        .ingest(
            &auth.user_id,
            &gemini,
            payload.title,
            payload.content,
            payload.metadata,
            payload.is_public,
        )
        .await?;
    // Embeddings are metered per chunk; charge a flat chunk count since the
    // embed endpoint reports no usage.
    charge_usage(&state, &auth.user_id, metered, document.chunk_count).await?;
    Ok((StatusCode::CREATED, Json(document.into())))
}

/// GET /api/v1/rag/documents
#[utoipa::path(
    get,
    path = "/api/v1/rag/documents",
    params(
        ("page" = Option<u32>, Query, description = "1-based page"),
        ("per_page" = Option<u32>, Query, description = "Page size, max 100"),
    ),
    responses((status = 200, description = "The caller's documents", body = DocumentListResponse)),
    security(("bearer_auth" = [])),
    tag = "rag"
)]
pub async fn list_documents(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<DocumentListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).min(100);
    let offset = ((page - 1) * per_page) as u64;

    let service = DocumentService::new(state.db.clone(), state.mongo.clone());
    let (documents, total) = service.list(&auth.user_id, offset, per_page as i64).await?;

    Ok(Json(DocumentListResponse {
        items: documents.into_iter().map(Into::into).collect(),
        total,
    }))
}

/// GET /api/v1/rag/documents/:id
#[utoipa::path(
    get,
    path = "/api/v1/rag/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document with its chunks", body = DocumentDetailResponse),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "rag"
)]
pub async fn get_document(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetailResponse>> {
    let service = DocumentService::new(state.db.clone(), state.mongo.clone());
    let document = service.get(&auth.user_id, &id).await?;
    let chunks = service.list_chunks(&auth.user_id, &id).await?;
    Ok(Json(DocumentDetailResponse {
        document: document.into(),
        chunks: chunks.into_iter().map(Into::into).collect(),
    }))
}

/// DELETE /api/v1/rag/documents/:id - removes the document and its chunks
#[utoipa::path(
    delete,
    path = "/api/v1/rag/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document and chunks removed"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "rag"
)]
pub async fn delete_document(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let service = DocumentService::new(state.db.clone(), state.mongo.clone());
    service.delete(&auth.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/rag/query
#[utoipa::path(
    post,
    path = "/api/v1/rag/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Ranked chunk hits", body = QueryResponse),
        (status = 502, description = "Embedding provider failure"),
    ),
    security(("bearer_auth" = [])),
    tag = "rag"
)]
pub async fn query_documents(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let (gemini, metered) = gemini_for_user(&state, &auth.user).await?;
    let service = DocumentService::new(state.db.clone(), state.mongo.clone());
    let hits = service
        .query(&auth.user_id, &gemini, &payload.query, payload.top_k)
        .await?;
    charge_usage(&state, &auth.user_id, metered, 1).await?;
    Ok(Json(QueryResponse { hits }))
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        create_document,
        list_documents,
        get_document,
        delete_document,
        query_documents
    ),
    components(schemas(
        CreateDocumentRequest,
        DocumentResponse,
        DocumentDetailResponse,
        ChunkResponse,
        DocumentListResponse,
        QueryRequest,
        QueryResponse,
        ChunkHit
    ))
)]
pub struct DocumentsApiDoc;

//! Chat session API handlers.

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
use crate::models::chat::{ChatMessage, ChatSession, MessageRole};
use crate::services::chat_service::ChatService;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/messages", post(send_message))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateSessionRequest {
    pub model_id: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ChatMessage> for MessageResponse {
    fn from(message: ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content,
            timestamp: message.timestamp.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub id: String,
    pub title: String,
    pub model_id: String,
    pub message_count: usize,
    pub token_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ChatSession> for SessionResponse {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            model_id: session.model_id.clone(),
            message_count: session.messages.len(),
            token_count: session.metadata.token_count,
            created_at: session.created_at.to_chrono(),
            updated_at: session.updated_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub messages: Vec<MessageResponse>,
}

impl From<ChatSession> for SessionDetailResponse {
    fn from(session: ChatSession) -> Self {
        Self {
            session: SessionResponse::from(&session),
            messages: session.messages.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionListResponse {
    pub items: Vec<SessionResponse>,
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
}

/// POST /api/v1/chat/sessions
#[utoipa::path(
    post,
    path = "/api/v1/chat/sessions",
    request_body = CreateSessionRequest,
    responses((status = 201, description = "Session created", body = SessionDetailResponse)),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionDetailResponse>)> {
    let service = ChatService::new(state.mongo.clone());
    let session = service
        .create_session(&auth.user_id, payload.model_id, payload.system_prompt)
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// GET /api/v1/chat/sessions
#[utoipa::path(
    get,
    path = "/api/v1/chat/sessions",
    params(
        ("page" = Option<u32>, Query, description = "1-based page"),
        ("per_page" = Option<u32>, Query, description = "Page size, max 100"),
    ),
    responses((status = 200, description = "The caller's sessions", body = SessionListResponse)),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<SessionListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).min(100);
    let offset = ((page - 1) * per_page) as u64;

    let service = ChatService::new(state.mongo.clone());
    let (sessions, total) = service
        .list_sessions(&auth.user_id, offset, per_page as i64)
        .await?;

    Ok(Json(SessionListResponse {
        items: sessions.iter().map(Into::into).collect(),
        total,
    }))
}

/// GET /api/v1/chat/sessions/:id
#[utoipa::path(
    get,
    path = "/api/v1/chat/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session with messages", body = SessionDetailResponse),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>> {
    let service = ChatService::new(state.mongo.clone());
    let session = service.get_session(&auth.user_id, &id).await?;
    Ok(Json(session.into()))
}

/// DELETE /api/v1/chat/sessions/:id
#[utoipa::path(
    delete,
    path = "/api/v1/chat/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session removed"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let service = ChatService::new(state.mongo.clone());
    service.delete_session(&auth.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/chat/sessions/:id/messages
#[utoipa::path(
    post,
    path = "/api/v1/chat/sessions/{id}/messages",
    params(("id" = String, Path, description = "Session id")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Session including the model reply", body = SessionDetailResponse),
        (status = 404, description = "Not found"),
        (status = 502, description = "Provider failure after retries"),
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn send_message(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<SessionDetailResponse>> {
    let (gemini, metered) = gemini_for_user(&state, &auth.user).await?;
    let service = ChatService::new(state.mongo.clone());
    let (session, usage) = service
        .send_message(&auth.user_id, &id, payload.content, &gemini)
        .await?;
    charge_usage(&state, &auth.user_id, metered, usage.total_tokens).await?;
    Ok(Json(session.into()))
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        create_session,
        list_sessions,
        get_session,
        delete_session,
        send_message
    ),
    components(schemas(
        CreateSessionRequest,
        MessageResponse,
        SessionResponse,
        SessionDetailResponse,
        SessionListResponse,
        SendMessageRequest
    ))
)]
pub struct ChatApiDoc;

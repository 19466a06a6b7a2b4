//! Stored provider API-key handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::api_key::{ApiKey, ApiService};
use crate::services::api_key_service::{ApiKeyService, CreateApiKeyRequest, UpdateApiKeyRequest};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_keys).post(create_key))
        .route(
            "/:id",
            get(get_key).patch(update_key).delete(delete_key),
        )
}

/// Key material never appears here, only the masked form.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApiKeyResponse {
    pub id: String,
    pub service: ApiService,
    pub name: String,
    pub masked_key: String,
    pub quota_limit: i64,
    pub quota_used: i64,
    pub quota_remaining: i64,
    pub quota_reset_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            quota_remaining: key.quota_remaining(),
            id: key.id,
            service: key.service,
            name: key.name,
            masked_key: key.masked_key,
            quota_limit: key.quota_limit,
            quota_used: key.quota_used,
            quota_reset_date: key.quota_reset_date.to_chrono(),
            is_active: key.is_active,
            created_at: key.created_at.to_chrono(),
        }
    }
}

/// GET /api/v1/keys
#[utoipa::path(
    get,
    path = "/api/v1/keys",
    responses((status = 200, description = "The caller's stored keys", body = [ApiKeyResponse])),
    security(("bearer_auth" = [])),
    tag = "keys"
)]
pub async fn list_keys(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<Vec<ApiKeyResponse>>> {
    let service = ApiKeyService::new(state.mongo.clone(), state.cipher.clone());
    let keys = service.list(&auth.user_id).await?;
    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/keys
#[utoipa::path(
    post,
    path = "/api/v1/keys",
    request_body = CreateApiKeyRequest,
    responses((status = 201, description = "Key stored", body = ApiKeyResponse)),
    security(("bearer_auth" = [])),
    tag = "keys"
)]
pub async fn create_key(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<ApiKeyResponse>)> {
    let service = ApiKeyService::new(state.mongo.clone(), state.cipher.clone());
    let key = service.create(&auth.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(key.into())))
}

/// GET /api/v1/keys/:id
#[utoipa::path(
    get,
    path = "/api/v1/keys/{id}",
    params(("id" = String, Path, description = "Key id")),
    responses(
        (status = 200, description = "Key details", body = ApiKeyResponse),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "keys"
)]
pub async fn get_key(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
) -> Result<Json<ApiKeyResponse>> {
    let service = ApiKeyService::new(state.mongo.clone(), state.cipher.clone());
    let key = service.get(&auth.user_id, &id).await?;
    Ok(Json(key.into()))
}

/// PATCH /api/v1/keys/:id
#[utoipa::path(
    patch,
    path = "/api/v1/keys/{id}",
    params(("id" = String, Path, description = "Key id")),
    request_body = UpdateApiKeyRequest,
    responses((status = 200, description = "Updated key", body = ApiKeyResponse)),
    security(("bearer_auth" = [])),
    tag = "keys"
)]
pub async fn update_key(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateApiKeyRequest>,
) -> Result<Json<ApiKeyResponse>> {
    let service = ApiKeyService::new(state.mongo.clone(), state.cipher.clone());
    let key = service.update(&auth.user_id, &id, payload).await?;
    Ok(Json(key.into()))
}

/// DELETE /api/v1/keys/:id
#[utoipa::path(
    delete,
    path = "/api/v1/keys/{id}",
    params(("id" = String, Path, description = "Key id")),
    responses(
        (status = 204, description = "Key removed"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "keys"
)]
pub async fn delete_key(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let service = ApiKeyService::new(state.mongo.clone(), state.cipher.clone());
    service.delete(&auth.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(list_keys, create_key, get_key, update_key, delete_key),
    components(schemas(ApiKeyResponse, CreateApiKeyRequest, UpdateApiKeyRequest))
)]
pub struct ApiKeysApiDoc;

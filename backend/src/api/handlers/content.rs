//! LinkedIn content API handlers: generation, analysis, profile
//! optimization, and post CRUD.

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
use crate::models::linkedin::{EngagementPrediction, GenerationParams, LinkedInPost};
use crate::services::content_service::{
    ContentAnalysis, ContentService, GeneratePostsRequest, OptimizeProfileRequest,
    PostVariation, ProfileOptimization,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/linkedin/post/generate", post(generate_posts))
        .route("/linkedin/post/analyze", post(analyze_post))
        .route("/linkedin/profile/optimize", post(optimize_profile))
        .route("/linkedin/posts", get(list_posts))
        .route("/linkedin/posts/:id", get(get_post).delete(delete_post))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GeneratePostsResponse {
    pub variations: Vec<PostVariation>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AnalyzePostRequest {
    pub content: String,
    /// Reserved for platform-specific analysis; only linkedin today.
    #[serde(default = "default_platform")]
    pub platform: String,
}

fn default_platform() -> String {
    "linkedin".to_string()
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OptimizeProfileResponse {
    pub suggestions: ProfileOptimization,
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub published: Option<bool>,
    pub ai_generated: Option<bool>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PostResponse {
    pub id: String,
    pub content: String,
    pub title: Option<String>,
    pub ai_generated: bool,
    pub ai_engagement_prediction: Option<EngagementPrediction>,
    pub generation_params: Option<GenerationParams>,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LinkedInPost> for PostResponse {
    fn from(post: LinkedInPost) -> Self {
        Self {
            id: post.id,
            content: post.content,
            title: post.title,
            ai_generated: post.ai_generated,
            ai_engagement_prediction: post.ai_engagement_prediction,
            generation_params: post.generation_params,
            is_published: post.is_published,
            published_at: post.published_at.map(|d| d.to_chrono()),
            tags: post.tags,
            created_at: post.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PostListResponse {
    pub items: Vec<PostResponse>,
    pub total: u64,
}

/// POST /api/v1/content/linkedin/post/generate
#[utoipa::path(
    post,
    path = "/api/v1/content/linkedin/post/generate",
    request_body = GeneratePostsRequest,
    responses(
        (status = 200, description = "Generated variations", body = GeneratePostsResponse),
        (status = 400, description = "Invalid parameters or no API key configured"),
        (status = 429, description = "Quota exhausted"),
        (status = 502, description = "Provider failure after retries"),
    ),
    security(("bearer_auth" = [])),
    tag = "content"
)]
pub async fn generate_posts(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<GeneratePostsRequest>,
) -> Result<Json<GeneratePostsResponse>> {
    let (gemini, metered) = gemini_for_user(&state, &auth.user).await?;
    let service = ContentService::new(state.mongo.clone());
    let result = service
        .generate_posts(&auth.user_id, &gemini, payload)
        .await?;
    charge_usage(&state, &auth.user_id, metered, result.usage.total_tokens).await?;
    Ok(Json(GeneratePostsResponse {
        variations: result.variations,
    }))
}

/// POST /api/v1/content/linkedin/post/analyze
#[utoipa::path(
    post,
    path = "/api/v1/content/linkedin/post/analyze",
    request_body = AnalyzePostRequest,
    responses(
        (status = 200, description = "Content analysis", body = ContentAnalysis),
        (status = 502, description = "Provider failure after retries"),
    ),
    security(("bearer_auth" = [])),
    tag = "content"
)]
pub async fn analyze_post(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<AnalyzePostRequest>,
) -> Result<Json<ContentAnalysis>> {
    let (gemini, metered) = gemini_for_user(&state, &auth.user).await?;
    let service = ContentService::new(state.mongo.clone());
    let (analysis, usage) = service.analyze_post(&gemini, &payload.content).await?;
    charge_usage(&state, &auth.user_id, metered, usage.total_tokens).await?;
    Ok(Json(analysis))
}

/// POST /api/v1/content/linkedin/profile/optimize
#[utoipa::path(
    post,
    path = "/api/v1/content/linkedin/profile/optimize",
    request_body = OptimizeProfileRequest,
    responses(
        (status = 200, description = "Optimization suggestions", body = OptimizeProfileResponse),
        (status = 502, description = "Provider failure after retries"),
    ),
    security(("bearer_auth" = [])),
    tag = "content"
)]
pub async fn optimize_profile(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<OptimizeProfileRequest>,
) -> Result<Json<OptimizeProfileResponse>> {
    let (gemini, metered) = gemini_for_user(&state, &auth.user).await?;
    let service = ContentService::new(state.mongo.clone());
    let (suggestions, usage) = service
        .optimize_profile(&auth.user_id, &gemini, payload)
        .await?;
    charge_usage(&state, &auth.user_id, metered, usage.total_tokens).await?;
    Ok(Json(OptimizeProfileResponse { suggestions }))
}

/// GET /api/v1/content/linkedin/posts
#[utoipa::path(
    get,
    path = "/api/v1/content/linkedin/posts",
    params(
        ("page" = Option<u32>, Query, description = "1-based page"),
        ("per_page" = Option<u32>, Query, description = "Page size, max 100"),
        ("published" = Option<bool>, Query, description = "Filter by publish state"),
        ("ai_generated" = Option<bool>, Query, description = "Filter by origin"),
    ),
    responses((status = 200, description = "The caller's posts", body = PostListResponse)),
    security(("bearer_auth" = [])),
    tag = "content"
)]
pub async fn list_posts(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PostListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).min(100);
    let offset = ((page - 1) * per_page) as u64;

    let service = ContentService::new(state.mongo.clone());
    let (posts, total) = service
        .list_posts(
            &auth.user_id,
            offset,
            per_page as i64,
            query.published,
            query.ai_generated,
        )
        .await?;

    Ok(Json(PostListResponse {
        items: posts.into_iter().map(Into::into).collect(),
        total,
    }))
}

/// GET /api/v1/content/linkedin/posts/:id
#[utoipa::path(
    get,
    path = "/api/v1/content/linkedin/posts/{id}",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post", body = PostResponse),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "content"
)]
pub async fn get_post(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>> {
    let service = ContentService::new(state.mongo.clone());
    let post = service.get_post(&auth.user_id, &id).await?;
    Ok(Json(post.into()))
}

/// DELETE /api/v1/content/linkedin/posts/:id
#[utoipa::path(
    delete,
    path = "/api/v1/content/linkedin/posts/{id}",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post removed"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "content"
)]
pub async fn delete_post(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let service = ContentService::new(state.mongo.clone());
    service.delete_post(&auth.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        generate_posts,
        analyze_post,
        optimize_profile,
        list_posts,
        get_post,
        delete_post
    ),
    components(schemas(
        GeneratePostsResponse,
        AnalyzePostRequest,
        OptimizeProfileResponse,
        PostResponse,
        PostListResponse,
        ContentAnalysis
    ))
)]
pub struct ContentApiDoc;

//! Authentication API handlers: register, login, refresh, logout.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::SharedState;
use crate::error::Result;
use crate::models::user::User;
use crate::services::auth_service::{AuthService, TokenPair};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            is_active: user.is_active,
            is_superuser: user.is_superuser,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    /// Username or email
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/v1/auth/register
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Email or username already taken"),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let service = AuthService::new(state.db.clone(), state.mongo.clone(), state.tokens.clone());
    let user = service
        .register(
            payload.email.trim(),
            payload.username.trim(),
            &payload.password,
            payload.full_name,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 401, description = "Bad credentials"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>> {
    let service = AuthService::new(state.db.clone(), state.mongo.clone(), state.tokens.clone());
    let pair = service.login(payload.username.trim(), &payload.password).await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/refresh
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Invalid or revoked refresh token"),
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<SharedState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>> {
    let service = AuthService::new(state.db.clone(), state.mongo.clone(), state.tokens.clone());
    let pair = service.refresh(&payload.refresh_token).await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/logout
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body = RefreshRequest,
    responses((status = 204, description = "Refresh token revoked")),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<SharedState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode> {
    let service = AuthService::new(state.db.clone(), state.mongo.clone(), state.tokens.clone());
    service.logout(&payload.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(register, login, refresh, logout),
    components(schemas(RegisterRequest, UserResponse, LoginRequest, RefreshRequest, TokenPair))
)]
pub struct AuthApiDoc;

//! Bearer JWT authentication middleware.
//!
//! Verifies the access token, loads the user from the document store, and
//! attaches an `AuthExtension` for handlers. Inactive users are rejected
//! even when their token is still valid.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bson::doc;

use crate::api::SharedState;
use crate::auth::TokenType;
use crate::error::{AppError, Result};
use crate::models::user::User;

/// Authenticated request context.
#[derive(Debug, Clone)]
pub struct AuthExtension {
    pub user_id: String,
    pub is_admin: bool,
    /// The full user document, loaded once per request.
    pub user: User,
}

pub async fn require_auth(
    State(state): State<SharedState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

async fn authenticate(state: &SharedState, headers: &HeaderMap) -> Result<AuthExtension> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = state.tokens.verify(token, TokenType::Access)?;

    let user = state
        .mongo
        .users()
        .find_one(doc! {"_id": &claims.sub})
        .await?
        .ok_or_else(|| AppError::Unauthorized("Could not validate credentials".to_string()))?;

    if !user.is_active {
        return Err(AppError::Validation("Inactive user".to_string()));
    }

    Ok(AuthExtension {
        user_id: user.id.clone(),
        is_admin: user.is_superuser,
        user,
    })
}

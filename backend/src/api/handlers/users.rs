//! Current-user API handlers.

use axum::{
    extract::{Extension, State},
    routing::{get, patch},
    Json, Router,
};
use bson::doc;
use serde::{Deserialize, Serialize};

use crate::api::handlers::auth::UserResponse;
use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::auth::mask_api_key;
use crate::error::Result;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/settings", patch(update_settings))
}

/// Settings as exposed to the client; the Gemini key only ever leaves the
/// server masked.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SettingsResponse {
    pub gemini_api_key_masked: Option<String>,
    pub linkedin_integration: bool,
    pub email_notifications: bool,
    pub theme: String,
    pub language: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub settings: SettingsResponse,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateSettingsRequest {
    /// Plaintext key; stored encrypted. Empty string clears the key.
    pub gemini_api_key: Option<String>,
    pub linkedin_integration: Option<bool>,
    pub email_notifications: Option<bool>,
    pub theme: Option<String>,
    pub language: Option<String>,
}

/// GET /api/v1/users/me
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses((status = 200, description = "Current user", body = MeResponse)),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn me(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<MeResponse>> {
    Ok(Json(me_response(&state, auth)))
}

/// PATCH /api/v1/users/me/settings
#[utoipa::path(
    patch,
    path = "/api/v1/users/me/settings",
    request_body = UpdateSettingsRequest,
    responses((status = 200, description = "Updated user", body = MeResponse)),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<MeResponse>> {
    let mut user = auth.user.clone();

    if let Some(key) = payload.gemini_api_key {
        user.settings.gemini_api_key = if key.trim().is_empty() {
            None
        } else {
            Some(state.cipher.encrypt(key.trim())?)
        };
    }
    if let Some(value) = payload.linkedin_integration {
        user.settings.linkedin_integration = value;
    }
    if let Some(value) = payload.email_notifications {
        user.settings.email_notifications = value;
    }
    if let Some(theme) = payload.theme {
        user.settings.theme = theme;
    }
    if let Some(language) = payload.language {
        user.settings.language = language;
    }
    user.updated_at = bson::DateTime::now();

    state
        .mongo
        .users()
        .replace_one(doc! {"_id": &user.id}, &user)
        .await?;

    Ok(Json(me_response(
        &state,
        AuthExtension {
            user_id: user.id.clone(),
            is_admin: user.is_superuser,
            user,
        },
    )))
}

fn me_response(state: &SharedState, auth: AuthExtension) -> MeResponse {
    let settings = &auth.user.settings;
    // The stored value is ciphertext; decrypt before masking so the display
    // form matches what the user entered. Undecryptable values show nothing.
    let masked = settings
        .gemini_api_key
        .as_ref()
        .and_then(|encrypted| state.cipher.decrypt(encrypted).ok())
        .map(|plaintext| mask_api_key(&plaintext));
    MeResponse {
        settings: SettingsResponse {
            gemini_api_key_masked: masked,
            linkedin_integration: settings.linkedin_integration,
            email_notifications: settings.email_notifications,
            theme: settings.theme.clone(),
            language: settings.language.clone(),
        },
        user: auth.user.into(),
    }
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(me, update_settings),
    components(schemas(MeResponse, SettingsResponse, UpdateSettingsRequest))
)]
pub struct UsersApiDoc;

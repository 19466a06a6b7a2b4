//! HTTP API: state, router assembly, middleware, handlers.

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod validation;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{ApiKeyCipher, TokenIssuer};
use crate::config::Config;
use crate::db::MongoStore;
use crate::error::Result;
use crate::models::user::User;
use crate::services::api_key_service::{ApiKeyService, ResolvedKey};
use crate::services::gemini::GeminiClient;

/// Shared application state.
pub struct AppState {
    pub db: PgPool,
    pub mongo: MongoStore,
    pub config: Config,
    pub cipher: ApiKeyCipher,
    pub tokens: TokenIssuer,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: PgPool, mongo: MongoStore, config: Config) -> Self {
        let cipher = ApiKeyCipher::from_config(&config);
        let tokens = TokenIssuer::from_config(&config);
        Self {
            db,
            mongo,
            config,
            cipher,
            tokens,
        }
    }
}

/// Resolve the Gemini key for a user, enforce quota on metered keys, and
/// build a client. Returns the key id to charge after the call, if any.
pub async fn gemini_for_user(
    state: &SharedState,
    user: &User,
) -> Result<(GeminiClient, Option<String>)> {
    let service = ApiKeyService::new(state.mongo.clone(), state.cipher.clone());
    let resolved = service.resolve_gemini_key(user, &state.config).await?;

    let metered_key_id = match &resolved {
        ResolvedKey::Metered { key_id, .. } => Some(key_id.clone()),
        ResolvedKey::Unmetered(_) => None,
    };
    if let Some(key_id) = &metered_key_id {
        service.check_quota(&user.id, key_id).await?;
    }

    let client = GeminiClient::new(
        &state.config.gemini_base_url,
        resolved.plaintext().to_string(),
        state.config.gemini_model.clone(),
        state.config.gemini_embed_model.clone(),
    );
    Ok((client, metered_key_id))
}

/// Charge a metered key after a completed AI call.
pub async fn charge_usage(
    state: &SharedState,
    user_id: &str,
    metered_key_id: Option<String>,
    tokens: i64,
) -> Result<()> {
    if let Some(key_id) = metered_key_id {
        let service = ApiKeyService::new(state.mongo.clone(), state.cipher.clone());
        service.record_usage(user_id, &key_id, tokens).await?;
    }
    Ok(())
}

/// Build the full application router.
pub fn build_router(state: SharedState) -> Router {
    let protected = Router::new()
        .nest("/users", handlers::users::router())
        .nest("/keys", handlers::api_keys::router())
        .nest("/content", handlers::content::router())
        .nest("/chat", handlers::chat::router())
        .nest("/rag", handlers::documents::router())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let api_v1 = Router::new()
        .nest("/auth", handlers::auth::router())
        .merge(protected);

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1)
        .merge(SwaggerUi::new("/docs").url("/api/v1/openapi.json", openapi::build_openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    if !state.config.cors_origins.is_empty() {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        app = app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app
}

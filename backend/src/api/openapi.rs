//! OpenAPI specification generated from handler annotations via utoipa.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Top-level OpenAPI document for the Postforge API.
///
/// Each handler module contributes its own paths and schemas via per-module
/// `#[derive(OpenApi)]` structs that are merged into this root document at
/// startup.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Postforge API",
        description = "AI-assisted content platform: LinkedIn post generation and analysis, chat, and retrieval over your own documents.",
        version = "0.4.1",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login, and token refresh"),
        (name = "users", description = "Current user and settings"),
        (name = "keys", description = "Stored provider API keys and quotas"),
        (name = "content", description = "LinkedIn post generation, analysis, and profile optimization"),
        (name = "chat", description = "Chat sessions over the generative model"),
        (name = "rag", description = "Document ingestion and vector search"),
        (name = "health", description = "Health and readiness checks"),
    ),
    components(schemas(ErrorResponse))
)]
pub struct ApiDoc;

/// Standard error response body returned by all endpoints on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "NOT_FOUND", "VALIDATION_ERROR")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Adds Bearer JWT security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.merge(super::handlers::auth::AuthApiDoc::openapi());
    doc.merge(super::handlers::users::UsersApiDoc::openapi());
    doc.merge(super::handlers::api_keys::ApiKeysApiDoc::openapi());
    doc.merge(super::handlers::content::ContentApiDoc::openapi());
    doc.merge(super::handlers::chat::ChatApiDoc::openapi());
    doc.merge(super::handlers::documents::DocumentsApiDoc::openapi());
    doc.merge(super::handlers::health::HealthApiDoc::openapi());

    doc
}

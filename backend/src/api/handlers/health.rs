//! Health check handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::SharedState;
use crate::db;
use crate::error::Result;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub postgres: bool,
    pub mongodb: bool,
}

/// GET /health - liveness plus a ping of both database engines.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health", body = HealthResponse)),
    tag = "health"
)]
pub async fn health_check(State(state): State<SharedState>) -> Result<Json<HealthResponse>> {
    let postgres = db::postgres::ping(&state.db).await.is_ok();
    let mongodb = state.mongo.ping().await.is_ok();

    let status = if postgres && mongodb { "ok" } else { "degraded" };
    Ok(Json(HealthResponse {
        status: status.to_string(),
        postgres,
        mongodb,
    }))
}

#[derive(utoipa::OpenApi)]
#[openapi(paths(health_check), components(schemas(HealthResponse)))]
pub struct HealthApiDoc;

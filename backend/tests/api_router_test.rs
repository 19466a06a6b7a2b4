//! Router-level tests that need no live database: request validation and
//! auth middleware reject these requests before any store is touched.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use mongodb::options::{ClientOptions, ServerAddress};
use serde_json::json;

use postforge_backend::api::{build_router, AppState};
use postforge_backend::config::Config;
use postforge_backend::db::MongoStore;

/// Build state over lazy connections; nothing here talks to a real server.
fn test_server() -> TestServer {
    let config = Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 8000,
        database_url: "postgres://localhost:1/unused".to_string(),
        database_max_connections: 1,
        mongodb_uri: "mongodb://localhost:1".to_string(),
        mongodb_db_name: "postforge_router_test".to_string(),
        jwt_secret: "router-test-secret-0123456789abcdef".to_string(),
        access_token_expire_minutes: 30,
        refresh_token_expire_days: 7,
        api_key_encryption_key: [9u8; 32],
        gemini_api_key: None,
        gemini_model: "gemini-pro".to_string(),
        gemini_embed_model: "text-embedding-004".to_string(),
        gemini_base_url: "http://localhost:1".to_string(),
        cors_origins: Vec::new(),
    };

    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy(&config.database_url)
        .expect("lazy pool");

    let options = ClientOptions::builder()
        .hosts(vec![ServerAddress::Tcp {
            host: "localhost".to_string(),
            port: Some(1),
        }])
        .server_selection_timeout(Some(Duration::from_millis(100)))
        .build();
    let client = mongodb::Client::with_options(options).expect("lazy mongo client");
    let mongo = MongoStore::new(client.database(&config.mongodb_db_name));

    let state = Arc::new(AppState::new(db, mongo, config));
    TestServer::new(build_router(state)).expect("test server")
}

#[tokio::test]
async fn test_register_rejects_invalid_email_before_touching_stores() {
    let server = test_server();
    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": "not-an-email",
            "username": "validname",
            "password": "correct horse battery staple"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let server = test_server();
    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": "user@example.com",
            "username": "validname",
            "password": "password1"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_route_requires_bearer_token() {
    let server = test_server();
    let response = server.get("/api/v1/users/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_protected_route_rejects_garbage_token() {
    let server = test_server();
    let response = server
        .get("/api/v1/chat/sessions")
        .authorization_bearer("not-a-jwt")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_with_garbage_token_is_unauthorized() {
    let server = test_server();
    let response = server
        .post("/api/v1/auth/refresh")
        .json(&json!({"refresh_token": "garbage"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let server = test_server();
    let response = server.get("/api/v1/nope").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

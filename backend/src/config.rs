//! Application configuration loaded from environment variables.
//!
//! `.env` files are honored via dotenvy (loaded in `main` before this runs).
//! Validation happens once at startup so a misconfigured deployment fails
//! fast instead of degrading at request time.

use base64::Engine;

use crate::error::{AppError, Result};

/// Runtime configuration for the server and both database engines.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind host, default 0.0.0.0
    pub server_host: String,
    /// Bind port, default 8000
    pub server_port: u16,

    /// PostgreSQL connection string (vector store + refresh tokens)
    pub database_url: String,
    /// Max PostgreSQL pool connections
    pub database_max_connections: u32,
    /// MongoDB connection string (document store)
    pub mongodb_uri: String,
    /// MongoDB database name
    pub mongodb_db_name: String,

    /// HS256 signing secret for access and refresh tokens
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,

    /// AES-256-GCM key for API keys at rest (32 bytes, decoded from base64)
    pub api_key_encryption_key: [u8; 32],

    /// Platform-level default Gemini key; users may store their own
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_embed_model: String,
    pub gemini_base_url: String,

    /// Allowed CORS origins; empty disables the CORS layer
    pub cors_origins: Vec<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{} is not a valid value", key))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load and validate configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Config("JWT_SECRET must be set".to_string()))?;
        if jwt_secret.len() < 32 {
            return Err(AppError::Config(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL must be set".to_string()))?;

        // The encryption key is mandatory: there is no degraded plaintext mode
        // for stored provider keys.
        let key_b64 = std::env::var("API_KEY_ENCRYPTION_KEY").map_err(|_| {
            AppError::Config("API_KEY_ENCRYPTION_KEY must be set (base64, 32 bytes)".to_string())
        })?;
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key_b64.trim())
            .map_err(|_| {
                AppError::Config("API_KEY_ENCRYPTION_KEY is not valid base64".to_string())
            })?;
        let api_key_encryption_key: [u8; 32] = key_bytes.try_into().map_err(|_| {
            AppError::Config("API_KEY_ENCRYPTION_KEY must decode to exactly 32 bytes".to_string())
        })?;

        let server_port: u16 = env_parse("SERVER_PORT", 8000)?;
        if server_port == 0 {
            return Err(AppError::Config("SERVER_PORT must be non-zero".to_string()));
        }

        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            server_host: env_or("SERVER_HOST", "0.0.0.0"),
            server_port,
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
            mongodb_uri: env_or("MONGODB_URI", "mongodb://localhost:27017"),
            mongodb_db_name: env_or("MONGODB_DB_NAME", "postforge"),
            jwt_secret,
            access_token_expire_minutes: env_parse("ACCESS_TOKEN_EXPIRE_MINUTES", 30)?,
            refresh_token_expire_days: env_parse("REFRESH_TOKEN_EXPIRE_DAYS", 7)?,
            api_key_encryption_key,
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty()),
            gemini_model: env_or("GEMINI_MODEL", "gemini-pro"),
            gemini_embed_model: env_or("GEMINI_EMBED_MODEL", "text-embedding-004"),
            gemini_base_url: env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            cors_origins,
        })
    }
}

//! Registration, login, and refresh-token rotation.
//!
//! User records live in MongoDB; refresh tokens are persisted in Postgres as
//! SHA-256 digests and rotated on every refresh.

use bson::doc;
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use crate::api::validation::validate_registration;
use crate::auth::{hash_password, token_digest, verify_password, TokenIssuer, TokenType};
use crate::db::MongoStore;
use crate::error::{AppError, Result};
use crate::models::refresh_token::RefreshTokenRow;
use crate::models::user::User;

/// Access/refresh pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

pub struct AuthService {
    db: PgPool,
    mongo: MongoStore,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(db: PgPool, mongo: MongoStore, tokens: TokenIssuer) -> Self {
        Self { db, mongo, tokens }
    }

    /// Register a new user. Email and username collisions are checked up
    /// front; the unique indexes catch races.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<User> {
        validate_registration(email, username, password)?;

        if self
            .mongo
            .users()
            .find_one(doc! {"email": email})
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        if self
            .mongo
            .users()
            .find_one(doc! {"username": username})
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let user = User::new(
            email.to_string(),
            username.to_string(),
            hash_password(password)?,
            full_name,
        );
        self.mongo.users().insert_one(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Authenticate by username or email. Unknown account and wrong password
    /// produce the same message.
    pub async fn login(&self, username_or_email: &str, password: &str) -> Result<TokenPair> {
        let users = self.mongo.users();
        let user = match users
            .find_one(doc! {"username": username_or_email})
            .await?
        {
            Some(user) => Some(user),
            None => users.find_one(doc! {"email": username_or_email}).await?,
        };

        let user = user.ok_or_else(|| {
            AppError::Authentication("Incorrect username or password".to_string())
        })?;

        if !verify_password(password, &user.hashed_password) {
            return Err(AppError::Authentication(
                "Incorrect username or password".to_string(),
            ));
        }
        if !user.is_active {
            return Err(AppError::Validation("Inactive user".to_string()));
        }

        let pair = self.issue_pair(&user.id).await?;

        users
            .update_one(
                doc! {"_id": &user.id},
                doc! {"$set": {
                    "last_login": bson::DateTime::now(),
                    "updated_at": bson::DateTime::now(),
                }},
            )
            .await?;

        Ok(pair)
    }

    /// Exchange a refresh token for a new pair. The presented token must
    /// verify as a refresh JWT and have an unrevoked, unexpired digest row;
    /// rotation revokes it before the replacement is issued.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;

        let digest = token_digest(refresh_token);
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, token_hash, expires_at, revoked_at, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(&digest)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let row = row.ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;
        if !row.is_usable(Utc::now()) || row.user_id != claims.sub {
            return Err(AppError::Unauthorized("Invalid token".to_string()));
        }

        let user = self
            .mongo
            .users()
            .find_one(doc! {"_id": &claims.sub})
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
        if !user.is_active {
            return Err(AppError::Validation("Inactive user".to_string()));
        }

        sqlx::query("UPDATE refresh_tokens SET revoked_at = NOW() WHERE id = $1")
            .bind(row.id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.issue_pair(&user.id).await
    }

    /// Revoke the presented refresh token. Idempotent: an unknown or already
    /// revoked token is not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let digest = token_digest(refresh_token);
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(&digest)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn issue_pair(&self, user_id: &str) -> Result<TokenPair> {
        let access_token = self.tokens.create_access_token(user_id)?;
        let refresh_token = self.tokens.create_refresh_token(user_id)?;

        let expires_at = Utc::now() + self.tokens.refresh_ttl();
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(token_digest(&refresh_token))
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        })
    }
}

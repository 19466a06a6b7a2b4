//! Stored provider API keys: CRUD, encryption at rest, and metered quota.
//!
//! Quota windows reset lazily: the first charge attempt past
//! `quota_reset_date` zeroes the counter and advances the window, so no
//! background job is required.

use bson::doc;
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use serde::Deserialize;

use crate::auth::{mask_api_key, ApiKeyCipher};
use crate::config::Config;
use crate::db::MongoStore;
use crate::error::{AppError, Result};
use crate::models::api_key::{ApiKey, ApiService, QUOTA_WINDOW_DAYS};
use crate::models::user::User;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateApiKeyRequest {
    pub service: ApiService,
    pub name: String,
    pub key: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateApiKeyRequest {
    pub name: Option<String>,
    pub quota_limit: Option<i64>,
    pub is_active: Option<bool>,
}

/// Outcome of resolving which Gemini key to use for a request.
pub enum ResolvedKey {
    /// A key registered in `api_keys`; usage is metered against `key_id`.
    Metered { plaintext: String, key_id: String },
    /// The user's settings key or the platform default; unmetered.
    Unmetered(String),
}

impl ResolvedKey {
    pub fn plaintext(&self) -> &str {
        match self {
            Self::Metered { plaintext, .. } => plaintext,
            Self::Unmetered(key) => key,
        }
    }
}

/// Apply the lazy monthly reset in memory. Returns true when the window
/// rolled over and the document needs persisting.
pub fn apply_lazy_reset(key: &mut ApiKey, now: chrono::DateTime<Utc>) -> bool {
    if key.quota_reset_date.to_chrono() <= now {
        key.quota_used = 0;
        key.quota_reset_date = bson::DateTime::from_chrono(now + Duration::days(QUOTA_WINDOW_DAYS));
        true
    } else {
        false
    }
}

pub struct ApiKeyService {
    mongo: MongoStore,
    cipher: ApiKeyCipher,
}

impl ApiKeyService {
    pub fn new(mongo: MongoStore, cipher: ApiKeyCipher) -> Self {
        Self { mongo, cipher }
    }

    pub async fn create(&self, user_id: &str, req: CreateApiKeyRequest) -> Result<ApiKey> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if req.key.trim().is_empty() {
            return Err(AppError::Validation("key is required".to_string()));
        }

        let api_key = ApiKey::new(
            user_id.to_string(),
            req.service,
            name.to_string(),
            self.cipher.encrypt(req.key.trim())?,
            mask_api_key(req.key.trim()),
        );
        self.mongo.api_keys().insert_one(&api_key).await?;

        tracing::info!(user_id = %user_id, service = %req.service, "API key stored");
        Ok(api_key)
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<ApiKey>> {
        let cursor = self
            .mongo
            .api_keys()
            .find(doc! {"user_id": user_id})
            .sort(doc! {"created_at": -1})
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<ApiKey> {
        self.mongo
            .api_keys()
            .find_one(doc! {"_id": id, "user_id": user_id})
            .await?
            .ok_or_else(|| AppError::NotFound("API key not found".to_string()))
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        req: UpdateApiKeyRequest,
    ) -> Result<ApiKey> {
        let mut key = self.get(user_id, id).await?;

        if let Some(name) = req.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::Validation("name is required".to_string()));
            }
            key.name = name;
        }
        if let Some(limit) = req.quota_limit {
            if limit < 0 {
                return Err(AppError::Validation(
                    "quota_limit must be non-negative".to_string(),
                ));
            }
            key.quota_limit = limit;
        }
        if let Some(active) = req.is_active {
            key.is_active = active;
        }
        key.updated_at = bson::DateTime::now();

        self.mongo
            .api_keys()
            .replace_one(doc! {"_id": id, "user_id": user_id}, &key)
            .await?;
        Ok(key)
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        let result = self
            .mongo
            .api_keys()
            .delete_one(doc! {"_id": id, "user_id": user_id})
            .await?;
        if result.deleted_count == 0 {
            return Err(AppError::NotFound("API key not found".to_string()));
        }
        Ok(())
    }

    /// Decrypt a stored key's material.
    pub fn decrypt(&self, key: &ApiKey) -> Result<String> {
        self.cipher.decrypt(&key.key)
    }

    /// Pick the Gemini key for a request: the user's stored google-service
    /// key when present and active, else the user's settings key, else the
    /// platform default.
    pub async fn resolve_gemini_key(&self, user: &User, config: &Config) -> Result<ResolvedKey> {
        let stored = self
            .mongo
            .api_keys()
            .find_one(doc! {
                "user_id": &user.id,
                "service": "google",
                "is_active": true,
            })
            .await?;

        if let Some(key) = stored {
            return Ok(ResolvedKey::Metered {
                plaintext: self.cipher.decrypt(&key.key)?,
                key_id: key.id,
            });
        }

        if let Some(encrypted) = &user.settings.gemini_api_key {
            return Ok(ResolvedKey::Unmetered(self.cipher.decrypt(encrypted)?));
        }

        config
            .gemini_api_key
            .clone()
            .map(ResolvedKey::Unmetered)
            .ok_or_else(|| {
                AppError::Validation(
                    "Gemini API key not configured. Please update your settings.".to_string(),
                )
            })
    }

    /// Enforce the quota window before a metered AI call. Rolls the window
    /// over when due and rejects exhausted keys.
    pub async fn check_quota(&self, user_id: &str, key_id: &str) -> Result<()> {
        let mut key = self.get(user_id, key_id).await?;
        if !key.is_active {
            return Err(AppError::Validation("API key is disabled".to_string()));
        }

        if apply_lazy_reset(&mut key, Utc::now()) {
            self.mongo
                .api_keys()
                .update_one(
                    doc! {"_id": &key.id},
                    doc! {"$set": {
                        "quota_used": key.quota_used,
                        "quota_reset_date": key.quota_reset_date,
                        "updated_at": bson::DateTime::now(),
                    }},
                )
                .await?;
        }

        if key.quota_remaining() == 0 {
            return Err(AppError::QuotaExceeded(format!(
                "monthly quota of {} tokens exhausted",
                key.quota_limit
            )));
        }
        Ok(())
    }

    /// Charge consumed tokens after a metered call.
    pub async fn record_usage(&self, user_id: &str, key_id: &str, tokens: i64) -> Result<()> {
        if tokens <= 0 {
            return Ok(());
        }
        self.mongo
            .api_keys()
            .update_one(
                doc! {"_id": key_id, "user_id": user_id},
                doc! {
                    "$inc": {"quota_used": tokens},
                    "$set": {"updated_at": bson::DateTime::now()},
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api_key::DEFAULT_QUOTA_LIMIT;

    fn key_with_reset(offset_days: i64, used: i64) -> ApiKey {
        let mut key = ApiKey::new(
            "u1".into(),
            ApiService::Google,
            "personal".into(),
            "ciphertext".into(),
            "sk-...ABCD".into(),
        );
        key.quota_used = used;
        key.quota_reset_date =
            bson::DateTime::from_chrono(Utc::now() + Duration::days(offset_days));
        key
    }

    #[test]
    fn test_no_reset_before_window_ends() {
        let mut key = key_with_reset(5, 42_000);
        assert!(!apply_lazy_reset(&mut key, Utc::now()));
        assert_eq!(key.quota_used, 42_000);
    }

    #[test]
    fn test_reset_fires_when_window_passed() {
        let mut key = key_with_reset(-1, 42_000);
        let now = Utc::now();
        assert!(apply_lazy_reset(&mut key, now));
        assert_eq!(key.quota_used, 0);
        let next = key.quota_reset_date.to_chrono();
        assert!(next > now + Duration::days(QUOTA_WINDOW_DAYS - 1));
    }

    #[test]
    fn test_defaults() {
        let key = key_with_reset(5, 0);
        assert_eq!(key.quota_limit, DEFAULT_QUOTA_LIMIT);
        assert_eq!(key.quota_remaining(), DEFAULT_QUOTA_LIMIT);
    }

    #[test]
    fn test_quota_remaining_never_negative() {
        let mut key = key_with_reset(5, 0);
        key.quota_used = key.quota_limit + 500;
        assert_eq!(key.quota_remaining(), 0);
    }
}

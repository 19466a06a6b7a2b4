//! Provider API keys stored in the `api_keys` collection.

use bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default monthly token quota for a newly registered key.
pub const DEFAULT_QUOTA_LIMIT: i64 = 100_000;

/// Quota window length in days.
pub const QUOTA_WINDOW_DAYS: i64 = 30;

/// External services a stored key may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApiService {
    Google,
    Openai,
    Linkedin,
    Github,
    Other,
}

impl std::fmt::Display for ApiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
            Self::Openai => write!(f, "openai"),
            Self::Linkedin => write!(f, "linkedin"),
            Self::Github => write!(f, "github"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub service: ApiService,
    pub name: String,
    /// AES-GCM encrypted key material, base64
    pub key: String,
    /// Display form, e.g. "sk-...ABCD"
    pub masked_key: String,
    pub quota_limit: i64,
    pub quota_used: i64,
    pub quota_reset_date: DateTime,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

fn default_true() -> bool {
    true
}

impl ApiKey {
    pub fn new(
        user_id: String,
        service: ApiService,
        name: String,
        encrypted_key: String,
        masked_key: String,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            service,
            name,
            key: encrypted_key,
            masked_key,
            quota_limit: DEFAULT_QUOTA_LIMIT,
            quota_used: 0,
            quota_reset_date: DateTime::from_chrono(now + chrono::Duration::days(QUOTA_WINDOW_DAYS)),
            is_active: true,
            created_at: DateTime::from_chrono(now),
            updated_at: DateTime::from_chrono(now),
        }
    }

    pub fn quota_remaining(&self) -> i64 {
        (self.quota_limit - self.quota_used).max(0)
    }
}

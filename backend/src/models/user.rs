//! User documents stored in the `users` collection.

use bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user preferences embedded in the user document.
///
/// `gemini_api_key` holds the AES-GCM-encrypted key, never plaintext.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub linkedin_integration: bool,
    #[serde(default = "default_true")]
    pub email_notifications: bool,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_true() -> bool {
    true
}

fn default_theme() -> String {
    "light".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub hashed_password: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(default)]
    pub last_login: Option<DateTime>,
    #[serde(default)]
    pub settings: UserSettings,
}

impl User {
    pub fn new(
        email: String,
        username: String,
        hashed_password: String,
        full_name: Option<String>,
    ) -> Self {
        let now = DateTime::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            username,
            full_name,
            hashed_password,
            is_active: true,
            is_superuser: false,
            created_at: now,
            updated_at: now,
            last_login: None,
            settings: UserSettings {
                email_notifications: true,
                theme: default_theme(),
                language: default_language(),
                ..Default::default()
            },
        }
    }
}

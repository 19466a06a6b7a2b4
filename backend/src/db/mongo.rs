//! MongoDB client management and typed collection access.

use bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use crate::config::Config;
use crate::error::Result;
use crate::models::api_key::ApiKey;
use crate::models::chat::ChatSession;
use crate::models::document::Document;
use crate::models::linkedin::{LinkedInPost, LinkedInProfile};
use crate::models::user::User;

pub const USERS: &str = "users";
pub const API_KEYS: &str = "api_keys";
pub const CHAT_SESSIONS: &str = "chat_sessions";
pub const DOCUMENTS: &str = "documents";
pub const LINKEDIN_PROFILES: &str = "linkedin_profiles";
pub const LINKEDIN_POSTS: &str = "linkedin_posts";

/// Handle to the document store with typed collection accessors.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Wrap an existing database handle (tests, tooling).
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connect and build the required indexes. Index creation is idempotent.
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = Client::with_uri_str(&config.mongodb_uri).await?;
        let store = Self {
            db: client.database(&config.mongodb_db_name),
        };
        store.ensure_indexes().await?;
        tracing::info!(db = %config.mongodb_db_name, "MongoDB connected");
        Ok(store)
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    pub fn api_keys(&self) -> Collection<ApiKey> {
        self.db.collection(API_KEYS)
    }

    pub fn chat_sessions(&self) -> Collection<ChatSession> {
        self.db.collection(CHAT_SESSIONS)
    }

    pub fn documents(&self) -> Collection<Document> {
        self.db.collection(DOCUMENTS)
    }

    pub fn linkedin_profiles(&self) -> Collection<LinkedInProfile> {
        self.db.collection(LINKEDIN_PROFILES)
    }

    pub fn linkedin_posts(&self) -> Collection<LinkedInPost> {
        self.db.collection(LINKEDIN_POSTS)
    }

    /// Liveness probe used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! {"ping": 1}).await?;
        Ok(())
    }

    /// Uniqueness of email/username and linkedin_id is enforced here, not in
    /// application code.
    async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"email": 1})
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"username": 1})
                    .options(unique.clone())
                    .build(),
            )
            .await?;

        self.api_keys()
            .create_index(IndexModel::builder().keys(doc! {"user_id": 1}).build())
            .await?;
        self.chat_sessions()
            .create_index(IndexModel::builder().keys(doc! {"user_id": 1}).build())
            .await?;
        self.documents()
            .create_index(IndexModel::builder().keys(doc! {"user_id": 1}).build())
            .await?;
        self.linkedin_posts()
            .create_index(IndexModel::builder().keys(doc! {"user_id": 1}).build())
            .await?;

        self.linkedin_profiles()
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"linkedin_id": 1})
                    .options(unique)
                    .build(),
            )
            .await?;

        Ok(())
    }
}

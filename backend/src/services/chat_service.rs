//! Chat sessions over the document store, with Gemini completions.

use bson::doc;
use futures::TryStreamExt;

use crate::db::MongoStore;
use crate::error::{AppError, Result};
use crate::models::chat::{ChatMessage, ChatSession, MessageRole, DEFAULT_SESSION_TITLE};
use crate::services::gemini::{GeminiClient, GenerationParams, TokenUsage};

pub struct ChatService {
    mongo: MongoStore,
}

impl ChatService {
    pub fn new(mongo: MongoStore) -> Self {
        Self { mongo }
    }

    pub async fn create_session(
        &self,
        user_id: &str,
        model_id: String,
        system_prompt: Option<String>,
    ) -> Result<ChatSession> {
        if model_id.trim().is_empty() {
            return Err(AppError::Validation("model_id is required".to_string()));
        }
        let session = ChatSession::new(user_id.to_string(), model_id, system_prompt);
        self.mongo.chat_sessions().insert_one(&session).await?;
        Ok(session)
    }

    pub async fn list_sessions(
        &self,
        user_id: &str,
        offset: u64,
        limit: i64,
    ) -> Result<(Vec<ChatSession>, u64)> {
        let filter = doc! {"user_id": user_id};
        let total = self
            .mongo
            .chat_sessions()
            .count_documents(filter.clone())
            .await?;
        let cursor = self
            .mongo
            .chat_sessions()
            .find(filter)
            .sort(doc! {"updated_at": -1})
            .skip(offset)
            .limit(limit)
            .await?;
        Ok((cursor.try_collect().await?, total))
    }

    pub async fn get_session(&self, user_id: &str, id: &str) -> Result<ChatSession> {
        self.mongo
            .chat_sessions()
            .find_one(doc! {"_id": id, "user_id": user_id})
            .await?
            .ok_or_else(|| AppError::NotFound("Chat session not found".to_string()))
    }

    pub async fn delete_session(&self, user_id: &str, id: &str) -> Result<()> {
        let result = self
            .mongo
            .chat_sessions()
            .delete_one(doc! {"_id": id, "user_id": user_id})
            .await?;
        if result.deleted_count == 0 {
            return Err(AppError::NotFound("Chat session not found".to_string()));
        }
        Ok(())
    }

    /// Append a user message, complete with the model, append the reply, and
    /// persist the updated session. Auto-titles on the first user message.
    pub async fn send_message(
        &self,
        user_id: &str,
        session_id: &str,
        content: String,
        gemini: &GeminiClient,
    ) -> Result<(ChatSession, TokenUsage)> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("message content is required".to_string()));
        }

        let mut session = self.get_session(user_id, session_id).await?;
        session
            .messages
            .push(ChatMessage::now(MessageRole::User, content));

        let generation = gemini
            .generate_chat(&session.messages, GenerationParams::default())
            .await?;

        session.messages.push(ChatMessage::now(
            MessageRole::Assistant,
            generation.text.clone(),
        ));

        if session.title == DEFAULT_SESSION_TITLE {
            if let Some(title) = session.derived_title() {
                session.title = title;
            }
        }
        session.metadata.token_count += generation.usage.total_tokens;
        session.metadata.model_version = Some(generation.model.clone());
        session.updated_at = bson::DateTime::now();

        self.mongo
            .chat_sessions()
            .replace_one(doc! {"_id": session_id, "user_id": user_id}, &session)
            .await?;

        Ok((session, generation.usage))
    }
}

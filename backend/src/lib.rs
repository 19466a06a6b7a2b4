//! Postforge backend: AI-assisted content platform.
//!
//! Auth (JWT + bcrypt), LinkedIn content generation/analysis through the
//! Gemini API, chat sessions, and RAG over user documents. Persistence is
//! split across MongoDB (document store, system of record) and PostgreSQL
//! (refresh tokens + pgvector embeddings).

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

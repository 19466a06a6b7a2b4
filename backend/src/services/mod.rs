//! Business logic services. Handlers construct these per request from the
//! shared state.

pub mod api_key_service;
pub mod auth_service;
pub mod chat_service;
pub mod content_service;
pub mod document_service;
pub mod gemini;

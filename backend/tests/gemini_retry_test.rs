//! Integration tests for the Gemini client against a wiremock server:
//! retry behavior, response parsing, and role mapping.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use postforge_backend::models::chat::{ChatMessage, MessageRole};
use postforge_backend::services::gemini::{GeminiClient, GenerationParams};

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        &server.uri(),
        "test-api-key".to_string(),
        "gemini-pro".to_string(),
        "text-embedding-004".to_string(),
    )
    .with_backoff_base(Duration::from_millis(10))
}

fn success_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            {"content": {"role": "model", "parts": [{"text": text}]}}
        ],
        "usageMetadata": {
            "promptTokenCount": 10,
            "candidatesTokenCount": 5,
            "totalTokenCount": 15
        }
    })
}

#[tokio::test]
async fn test_generate_parses_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("Hello from the model")))
        .expect(1)
        .mount(&server)
        .await;

    let generation = client(&server)
        .generate_text("Say hello", GenerationParams::default())
        .await
        .unwrap();

    assert_eq!(generation.text, "Hello from the model");
    assert_eq!(generation.model, "gemini-pro");
    assert_eq!(generation.usage.prompt_tokens, 10);
    assert_eq!(generation.usage.completion_tokens, 5);
    assert_eq!(generation.usage.total_tokens, 15);
}

#[tokio::test]
async fn test_retries_twice_on_500_then_succeeds() {
    let server = MockServer::start().await;

    // First two attempts fail, the third succeeds.
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let generation = client(&server)
        .generate_text("retry me", GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(generation.text, "recovered");
}

#[tokio::test]
async fn test_gives_up_after_three_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let result = client(&server)
        .generate_text("doomed", GenerationParams::default())
        .await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("3 attempts"), "got: {}", err);
}

#[tokio::test]
async fn test_unparseable_body_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("parsed")))
        .expect(1)
        .mount(&server)
        .await;

    let generation = client(&server)
        .generate_text("parse me", GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(generation.text, "parsed");
}

#[tokio::test]
async fn test_chat_maps_assistant_to_model_role() {
    let server = MockServer::start().await;

    // The request must carry the assistant turn as role "model" and lift the
    // system prompt out of `contents`.
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "Hi"}]},
                {"role": "model", "parts": [{"text": "Hello!"}]},
                {"role": "user", "parts": [{"text": "How are you?"}]}
            ],
            "systemInstruction": {"parts": [{"text": "Be terse."}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("Fine.")))
        .expect(1)
        .mount(&server)
        .await;

    let messages = vec![
        ChatMessage::now(MessageRole::System, "Be terse.".to_string()),
        ChatMessage::now(MessageRole::User, "Hi".to_string()),
        ChatMessage::now(MessageRole::Assistant, "Hello!".to_string()),
        ChatMessage::now(MessageRole::User, "How are you?".to_string()),
    ];
    let generation = client(&server)
        .generate_chat(&messages, GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(generation.text, "Fine.");
}

#[tokio::test]
async fn test_embed_returns_vector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-embedding-004:embedContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": {"values": [0.1, -0.2, 0.3]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedding = client(&server).embed("some text").await.unwrap();
    assert_eq!(embedding, vec![0.1, -0.2, 0.3]);
}

#[tokio::test]
async fn test_empty_candidates_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let result = client(&server)
        .generate_text("empty", GenerationParams::default())
        .await;
    assert!(result.is_err());
}

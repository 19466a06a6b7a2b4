//! HTTP client for the Gemini generative language REST API.
//!
//! All outbound calls go through a fixed-attempt exponential-backoff retry
//! (3 attempts, 2s doubling capped at 10s) applied uniformly to transport
//! errors, non-success statuses, and unparseable bodies.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::chat::{ChatMessage, MessageRole};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_CAP: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling parameters forwarded to the model.
#[derive(Debug, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub max_output_tokens: i32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

/// Token accounting from `usageMetadata`; zeros when the API omits it.
#[derive(Debug, Clone, Copy, Default, Serialize, utoipa::ToSchema)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

/// One completed generation.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub latency_ms: u64,
    pub usage: TokenUsage,
}

// --- wire types -----------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i64,
    #[serde(default)]
    candidates_token_count: i64,
    #[serde(default)]
    total_token_count: i64,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Client bound to one API key (platform default or a user's own).
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    embed_model: String,
    backoff_base: Duration,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: String, model: String, embed_model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            embed_model,
            backoff_base: Duration::from_secs(2),
        }
    }

    /// Shrink the retry backoff (test hook).
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single-prompt text generation.
    pub async fn generate_text(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<Generation> {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": generation_config(params),
        });
        self.generate(&body).await
    }

    /// Multi-turn generation. Assistant turns map to the API's "model" role;
    /// system turns are lifted into `systemInstruction`.
    pub async fn generate_chat(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<Generation> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| {
                let role = match m.role {
                    MessageRole::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config(params),
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": system.join("\n")}]});
        }
        self.generate(&body).await
    }

    /// Embed one text (768 dimensions for text-embedding-004).
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/v1beta/models/{}:embedContent?key={}",
            self.base_url, self.embed_model, self.api_key
        );
        let body = json!({"content": {"parts": [{"text": text}]}});
        let response: EmbedContentResponse = self.post_json(&url, &body).await?;
        Ok(response.embedding.values)
    }

    /// Embed a batch of texts sequentially, preserving order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    async fn generate(&self, body: &serde_json::Value) -> Result<Generation> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let started = Instant::now();
        let response: GenerateContentResponse = self.post_json(&url, body).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text = response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AppError::AiProvider(
                "model returned no candidates".to_string(),
            ));
        }

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(Generation {
            text,
            model: self.model.clone(),
            latency_ms,
            usage,
        })
    }

    /// POST with the uniform retry policy. Any failure mode counts as a
    /// retryable attempt; the last error is surfaced after the budget is
    /// spent.
    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let mut delay = self.backoff_base;
        let mut last_err = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_post::<T>(url, body).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    last_err = err;
                    if attempt < MAX_ATTEMPTS {
                        tracing::warn!(
                            attempt,
                            error = %last_err,
                            "Gemini request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(BACKOFF_CAP);
                    }
                }
            }
        }

        Err(AppError::AiProvider(format!(
            "request failed after {} attempts: {}",
            MAX_ATTEMPTS, last_err
        )))
    }

    async fn try_post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<T, String> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("transport error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("status {}: {}", status, truncate(&detail, 200)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| format!("unparseable response: {}", e))
    }
}

fn generation_config(params: GenerationParams) -> serde_json::Value {
    json!({
        "temperature": params.temperature,
        "topP": params.top_p,
        "topK": params.top_k,
        "maxOutputTokens": params.max_output_tokens,
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_match_documented_defaults() {
        let params = GenerationParams::default();
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.top_p, 0.95);
        assert_eq!(params.top_k, 40);
        assert_eq!(params.max_output_tokens, 1024);
    }

    #[test]
    fn test_response_parsing_with_usage() {
        let raw = serde_json::json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "world"}]}}
            ],
            "usageMetadata": {
                "promptTokenCount": 12,
                "candidatesTokenCount": 3,
                "totalTokenCount": 15
            }
        });
        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        let usage = parsed.usage_metadata.unwrap();
        assert_eq!(usage.total_token_count, 15);
    }

    #[test]
    fn test_response_parsing_without_usage() {
        let raw = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
        });
        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        assert!(parsed.usage_metadata.is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("short", 200), "short");
    }
}

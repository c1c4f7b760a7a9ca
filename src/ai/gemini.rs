//! HTTP client for the Gemini generative-language API.
//!
//! Two capabilities are consumed: `generateContent` for text generation
//! (optionally forced to JSON output for classification) and `embedContent`
//! for embedding vectors. Errors are classified by HTTP status so callers
//! can log something more useful than "request failed"; no retries happen
//! here — the pipeline decides per call site whether a failure degrades to
//! a fallback or surfaces to the user.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// External model capability: text generation and embedding.
///
/// The pipeline and chat engine depend on this trait, not on the concrete
/// client, so tests can substitute a stub model.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Free-form text generation.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Generation with the response forced to `application/json`.
    async fn generate_json(&self, prompt: &str) -> Result<String, LlmError>;

    /// Embed arbitrary text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("model server error: {0}")]
    ServerError(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response shape: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    content: Content<'a>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini REST client.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: config.gemini_api_key.clone(),
            model: config.ai_model.clone(),
            embedding_model: config.embedding_model.clone(),
        }
    }

    async fn generate_inner(&self, prompt: &str, json: bool) -> Result<String, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: json.then_some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| LlmError::Parse("no candidates in response".to_string()))
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_inner(prompt, false).await
    }

    async fn generate_json(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_inner(prompt, true).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.embedding_model, self.api_key
        );

        let body = EmbedRequest {
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(parsed.embedding.values)
    }
}

fn classify_transport(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Network(format!("request timed out: {}", err))
    } else if err.is_connect() {
        LlmError::Network(format!("connection failed: {}", err))
    } else {
        LlmError::Network(err.to_string())
    }
}

fn classify_status(status: reqwest::StatusCode, body: String) -> LlmError {
    match status.as_u16() {
        400 | 401 | 403 | 404 => {
            LlmError::InvalidRequest(format!("{}: {}", status, body))
        }
        429 => LlmError::RateLimited(body),
        500 | 502 | 503 | 504 => LlmError::ServerError(format!("{}: {}", status, body)),
        _ => LlmError::ServerError(format!("unexpected status {}: {}", status, body)),
    }
}

//! Google Gemini backend

use super::{GenerationBackend, GenerationError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Single-attempt Gemini `generateContent` client
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    endpoint: String,
    model_id: String,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let endpoint = format!("{GEMINI_API_BASE}/{model}:generateContent");
        Self::with_endpoint(api_key, endpoint, model, timeout)
    }

    /// Point at an explicit `generateContent` URL (gateways, tests)
    pub fn with_endpoint(
        api_key: String,
        endpoint: impl Into<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: endpoint.into(),
            model_id: model.to_string(),
        })
    }

    fn build_request(prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }

    /// Pull `candidates[0].content.parts[0].text` out of a response body
    fn extract_text(body: &str) -> Result<String, GenerationError> {
        let response: GeminiResponse = serde_json::from_str(body)
            .map_err(|e| GenerationError::malformed(format!("Failed to parse response: {e}")))?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| GenerationError::malformed("Response was not in the expected format"))
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn attempt(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::timeout(format!("Request timeout: {e}"))
                } else {
                    GenerationError::transport(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::timeout(format!("Timed out reading response: {e}"))
            } else {
                GenerationError::transport(format!("Failed to read response: {e}"))
            }
        })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::rate_limit(format!(
                "Rate limit exceeded: {}",
                error_message(&body)
            )));
        }
        if !status.is_success() {
            return Err(GenerationError::http(format!(
                "HTTP {status}: {}",
                error_message(&body)
            )));
        }

        Self::extract_text(&body)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Best-effort human message from an error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<GeminiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

// Gemini API types

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

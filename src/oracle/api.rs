//! HTTP oracle providers (Gemini and OpenAI-compatible).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{OracleConfig, OracleProvider};
use crate::error::{OracleError, Result};

use super::{CompletionRequest, Oracle};

fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OracleError::Http(format!("Failed to create HTTP client: {}", e)).into())
}

fn resolve_api_key(configured: &Option<String>, env_var: &str) -> Result<String> {
    configured
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| OracleError::MissingApiKey(env_var.to_string()).into())
}

fn map_send_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else if e.is_connect() {
        OracleError::Http(format!("Connection failed: {}", e))
    } else {
        OracleError::Http(format!("Request failed: {}", e))
    }
}

/// Turn a non-success response into an [`OracleError`].
async fn error_from_response(response: reqwest::Response) -> OracleError {
    let status = response.status();
    if status.as_u16() == 429 {
        return OracleError::RateLimited;
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    let message = serde_json::from_str::<ErrorResponse>(&error_text)
        .map(|e| e.error.message)
        .unwrap_or(error_text);

    OracleError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Error body shared by both providers.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ============================================================================
// Gemini
// ============================================================================

/// Google Gemini `generateContent` provider.
pub struct GeminiOracle {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig<'a> {
    thinking_config: GeminiThinkingConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiThinkingConfig<'a> {
    thinking_level: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GeminiResponse {
    /// Concatenated answer text of the first candidate, without thought parts.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content
            .parts
            .into_iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

impl GeminiOracle {
    pub const API_KEY_ENV: &'static str = "GEMINI_API_KEY";

    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.api_key, Self::API_KEY_ENV)?;
        Self::new(&config.base_url(), &api_key, config.timeout_secs)
    }

    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let prompt = request.prompt();

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: &prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                thinking_config: GeminiThinkingConfig {
                    thinking_level: request.level.as_str(),
                },
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await.into());
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Http(format!("Failed to parse response: {}", e)))?;

        parsed.text().ok_or_else(|| OracleError::EmptyCompletion.into())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// OpenAI-compatible
// ============================================================================

/// OpenAI-compatible `chat/completions` provider.
pub struct OpenAiOracle {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    reasoning_effort: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiOracle {
    pub const API_KEY_ENV: &'static str = "OPENAI_API_KEY";

    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.api_key, Self::API_KEY_ENV)?;
        Self::new(&config.base_url(), &api_key, config.timeout_secs)
    }

    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let prompt = request.prompt();

        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            reasoning_effort: request.level.as_str(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await.into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Http(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| OracleError::EmptyCompletion.into())
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Build the configured provider as a shareable handle.
pub fn from_config(config: &OracleConfig) -> Result<std::sync::Arc<dyn Oracle>> {
    let oracle: std::sync::Arc<dyn Oracle> = match config.provider {
        OracleProvider::Gemini => std::sync::Arc::new(GeminiOracle::from_config(config)?),
        OracleProvider::OpenAi => std::sync::Arc::new(OpenAiOracle::from_config(config)?),
    };
    tracing::info!(
        provider = oracle.name(),
        model = %config.model,
        level = %config.level,
        "Oracle client created"
    );
    Ok(oracle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_response_text_skips_thoughts() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "TypeCheckPassed"}
                ]}
            }]
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some("TypeCheckPassed"));
    }

    #[test]
    fn test_gemini_response_without_candidates() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn test_gemini_request_shape() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: "hello" }],
            }],
            generation_config: GeminiGenerationConfig {
                thinking_config: GeminiThinkingConfig {
                    thinking_level: "low",
                },
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["generationConfig"]["thinkingConfig"]["thinkingLevel"], "low");
    }

    #[test]
    fn test_from_config_with_api_key() {
        let config = OracleConfig {
            api_key: Some("test-key".to_string()),
            base_url: Some("https://example.test/v1beta/".to_string()),
            ..OracleConfig::default()
        };

        let oracle = GeminiOracle::from_config(&config).unwrap();
        assert!(!oracle.base_url.ends_with('/'));
        assert_eq!(oracle.name(), "gemini");
    }

    #[test]
    fn test_openai_from_config_with_api_key() {
        let config = OracleConfig {
            provider: OracleProvider::OpenAi,
            api_key: Some("test-key".to_string()),
            ..OracleConfig::default()
        };

        let oracle = from_config(&config).unwrap();
        assert_eq!(oracle.name(), "openai");
    }

    #[tokio::test]
    #[ignore = "requires API key"]
    async fn test_gemini_integration() {
        let config = OracleConfig::default();
        let oracle = GeminiOracle::from_config(&config).unwrap();
        let request = CompletionRequest::new(
            &config.model,
            vec!["Reply with the single word: ready".to_string()],
            config.level,
        );
        let text = oracle.complete(&request).await.unwrap();
        assert!(!text.is_empty());
    }
}

//! Insight module: AI commentary on a strip result
//!
//! Provides an `InsightBackend` trait with a Gemini `generateContent`
//! implementation, the fixed analysis prompt, and the `Insight` text type
//! (bold markers stripped). Calls are one-shot: no retry, no fallback.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::{InsightConfig, DEFAULT_GEMINI_BASE_URL};
use crate::models::{Category, Readings};
use crate::scoring::RiskScore;

// ============================================================================
// InsightBackend trait
// ============================================================================

/// Abstraction over text-generation providers.
#[async_trait]
pub trait InsightBackend: Send + Sync {
    /// Generate text for a prompt. Errors are returned as-is; callers decide
    /// what to tell the user.
    async fn generate(&self, prompt: &str) -> Result<String, InsightError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Prompt blocked by the service: {reason}")]
    Blocked { reason: String },

    #[error("Response contained no generated text")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,
}

impl From<reqwest::Error> for InsightError {
    fn from(e: reqwest::Error) -> Self {
        InsightError::Http(e.without_url())
    }
}

// ============================================================================
// Insight text
// ============================================================================

const BOLD_MARKER: &str = "**";

/// Generated commentary, ready for display and storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Insight(String);

impl Insight {
    /// Strip every `**` emphasis marker from raw model output.
    pub fn from_raw(raw: &str) -> Self {
        Self(raw.replace(BOLD_MARKER, ""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Prompt
// ============================================================================

const PROMPT_PREAMBLE: &str = "You're a health AI helping young women detect early PCOS indicators via sweat-based test strips.";
const PROMPT_REQUEST: &str = "Give a detailed analysis of what this may mean. Then suggest 4-5 personalized tips (lifestyle or diet). Make it friendly and encouraging.";

pub fn build_prompt(readings: &Readings, score: RiskScore) -> String {
    let mut prompt = String::new();
    prompt.push_str(PROMPT_PREAMBLE);
    prompt.push_str("\n\nUser submitted:\n");
    for category in Category::ALL {
        prompt.push_str(&format!(
            "• {}: {}\n",
            category.label(),
            readings.get(category).trim()
        ));
    }
    prompt.push_str(&format!("\nHeuristic risk score: {}\n\n", score));
    prompt.push_str(PROMPT_REQUEST);
    prompt
}

/// Build the prompt, call the backend once, and clean the reply.
pub async fn request_insight(
    backend: &dyn InsightBackend,
    readings: &Readings,
    score: RiskScore,
) -> Result<Insight, InsightError> {
    let prompt = build_prompt(readings, score);
    tracing::debug!(backend = backend.name(), prompt_len = prompt.len(), "Requesting insight");
    let raw = backend.generate(&prompt).await?;
    Ok(Insight::from_raw(&raw))
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, InsightError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if !text.is_empty() {
            return Ok(text);
        }

        match self.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(InsightError::Blocked { reason }),
            None => Err(InsightError::EmptyResponse),
        }
    }
}

// ============================================================================
// GeminiInsightClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub timeout: Option<Duration>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout: None,
        }
    }
}

impl From<&InsightConfig> for GeminiConfig {
    fn from(cfg: &InsightConfig) -> Self {
        Self {
            api_key: cfg.resolved_api_key(),
            model: cfg.model.clone(),
            timeout: cfg.timeout_seconds.map(Duration::from_secs),
        }
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini text client calling `models/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiInsightClient {
    client: Client,
    config: GeminiConfig,
    base_url: String,
}

impl GeminiInsightClient {
    pub fn new(config: GeminiConfig) -> Result<Self, InsightError> {
        Self::with_base_url(config, DEFAULT_GEMINI_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / proxies)
    pub fn with_base_url(mut config: GeminiConfig, base_url: String) -> Result<Self, InsightError> {
        if config.api_key.is_empty() {
            return Err(InsightError::MissingApiKey);
        }

        // Accept both "gemini-1.5-flash" and "models/gemini-1.5-flash".
        config.model = config.model.trim_start_matches("models/").to_string();

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &InsightConfig) -> Result<Self, InsightError> {
        Self::with_base_url(GeminiConfig::from(cfg), cfg.base_url.clone())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl InsightBackend for GeminiInsightClient {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.config.model
        );

        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(InsightError::Api { code, message });
        }

        let body: GenerateContentResponse = response.json().await?;
        body.into_text()
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================

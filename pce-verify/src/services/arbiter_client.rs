//! LLM Arbiter Client
//!
//! Breaks ambiguous candidate sets by asking a Gemini model to pick one
//! candidate. Every failure mode (transport, status, empty reply, unparsable
//! JSON) is reported as `ArbiterVerdict::Failed`; the orchestrator decides
//! what to do with it.
//!
//! # API Reference
//! - `POST {base}/models/{model}:generateContent`
//! - Auth: `x-goog-api-key` header

use crate::error::LookupError;
use crate::services::USER_AGENT;
use crate::types::{ArbiterDelegate, ArbiterVerdict, ArbitrationRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Generative Language API base URL
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Normalization prompt for one arbitration request
pub fn build_prompt(request: &ArbitrationRequest) -> String {
    let candidates =
        serde_json::to_string_pretty(&request.candidates).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are a clinical medication normalization assistant.

PACKAGE TEXT:
{text}

CANDIDATES:
{candidates}

TASK:
Select the single candidate that best matches the package text.

RULES:
- Prefer candidates whose ingredients all appear in the package text
- Penalize candidates that add ingredients the text does not mention
- Prefer a dosage form consistent with the text
- Use indication clues such as "for pain"
- Ignore brand and marketing noise
- If no candidate fits, return null for "name"

Return ONLY valid JSON:
{{
  "name": "<exact candidate name or null>",
  "reason": "<short justification>"
}}
"#,
        text = request.text,
        candidates = candidates
    )
}

/// First JSON object in a model reply, tolerating code fences and prose
pub fn extract_json(reply: &str) -> Option<Value> {
    let trimmed = reply.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// Map a parsed reply to a verdict
///
/// A non-empty string `name` is a pick; a missing, null or empty `name` is a
/// decline. Candidate membership is checked by the caller.
pub fn parse_verdict(parsed: &Value) -> ArbiterVerdict {
    let name = parsed
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty());

    match name {
        Some(name) => ArbiterVerdict::Accepted {
            name: name.to_string(),
            reason: parsed
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
        },
        None => ArbiterVerdict::Declined,
    }
}

pub struct ArbiterClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ArbiterClient {
    /// Create an arbiter client
    ///
    /// # Errors
    /// - `LookupError::NotConfigured` if `api_key` is blank
    /// - `LookupError::Network` if the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LookupError::NotConfigured("arbiter API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, LookupError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LookupError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(format!("Failed to parse arbiter response: {}", e)))?;

        parsed
            .text()
            .ok_or_else(|| LookupError::Parse("arbiter reply has no text".to_string()))
    }
}

#[async_trait]
impl ArbiterDelegate for ArbiterClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn arbitrate(&self, request: &ArbitrationRequest) -> ArbiterVerdict {
        let prompt = build_prompt(request);

        let reply = match self.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(model = %self.model, error = %e, "Arbiter call failed");
                return ArbiterVerdict::Failed(e.to_string());
            }
        };

        debug!(model = %self.model, reply = %reply, "Arbiter raw reply");

        match extract_json(&reply) {
            Some(parsed) => parse_verdict(&parsed),
            None => {
                warn!(model = %self.model, "Arbiter reply contained no JSON object");
                ArbiterVerdict::Failed("unparsable arbiter reply".to_string())
            }
        }
    }
}

//! Language-model interaction: one single-turn chat completion per prompt.
//!
//! The [`CompletionClient`] trait takes the API key per call, so one client
//! (and one pooled `reqwest::Client`) serves every request regardless of whose
//! key it carries. [`ChatCompletionsClient`] speaks the OpenAI-compatible
//! `POST {base}/chat/completions` protocol that DeepSeek and most hosted
//! providers accept.
//!
//! ## Response handling
//!
//! The first choice whose content is non-empty after trimming wins, and is
//! returned trimmed. Nothing else about the text is checked. Every failure
//! (transport, timeout, auth, non-2xx, no usable choice) gets its own
//! [`RizzError`] variant for the logs.

use crate::config::{ApiKey, ServerConfig};
use crate::error::RizzError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest provider error body kept in [`RizzError::LlmApi`].
const MAX_ERROR_BODY: usize = 500;

/// Produces a completion for a single user prompt.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the trimmed text of the first non-empty choice.
    async fn complete(&self, prompt: &str, api_key: &ApiKey) -> Result<String, RizzError>;
}

/// HTTP client for OpenAI-compatible chat-completion endpoints.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, RizzError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RizzError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            max_tokens,
            timeout,
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, RizzError> {
        Self::new(
            &config.llm_base_url,
            config.model.clone(),
            config.max_tokens,
            Duration::from_secs(config.api_timeout_secs),
        )
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [RequestMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(&self, prompt: &str, api_key: &ApiKey) -> Result<String, RizzError> {
        let start = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key.expose())
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RizzError::LlmTimeout {
                        secs: self.timeout.as_secs(),
                    }
                } else {
                    RizzError::LlmTransport {
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RizzError::LlmTimeout {
                    secs: self.timeout.as_secs(),
                }
            } else {
                RizzError::LlmTransport {
                    detail: e.to_string(),
                }
            }
        })?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(RizzError::LlmAuth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(RizzError::LlmApi {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let text = parse_completion(&body)?;
        debug!(
            "Completion from {}: {} chars in {:?}",
            self.model,
            text.len(),
            start.elapsed()
        );
        Ok(text)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Extract the first non-empty, trimmed choice content from a response body.
fn parse_completion(body: &str) -> Result<String, RizzError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| RizzError::MalformedResponse {
            detail: e.to_string(),
        })?;

    if let Some(usage) = &parsed.usage {
        debug!(
            "{} input tokens, {} output tokens",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    parsed
        .choices
        .into_iter()
        .filter_map(|c| c.message.and_then(|m| m.content))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
        .ok_or(RizzError::EmptyCompletion)
}

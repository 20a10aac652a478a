//! OpenAI-compatible HTTP backend.
//!
//! One HTTPS POST per invocation; every outcome is classified into exactly
//! one [`ErrorKind`](crate::ErrorKind) via the status mapping in
//! [`classify_status`]. Retrying is the caller's concern (see
//! [`crate::retry::Retrier`]).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{LlmError, redact_error_message};
use crate::types::{ChatRequest, LlmBackend, LlmResult, Message};

/// Longest body excerpt carried into an error message
const BODY_EXCERPT_LEN: usize = 200;

/// Default HTTP request parameters
#[derive(Debug, Clone)]
pub struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.2,
        }
    }
}

/// HTTP backend speaking the OpenAI chat-completions wire format.
#[derive(Clone)]
pub struct ChatBackend {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

impl ChatBackend {
    /// Create a new backend.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Unknown` if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        default_params: HttpParams,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                LlmError::Unknown(format!(
                    "failed to construct HTTP client: {}",
                    redact_error_message(&e.to_string())
                ))
            })?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            default_params,
        })
    }

    /// Create a backend from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` when no API key is configured, or
    /// `LlmError::Unknown` if the HTTP client cannot be constructed.
    pub fn new_from_config(config: &promptsplit_config::Config) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::InvalidRequest(format!(
                "API key not configured; set {} or api_key in {}",
                promptsplit_config::API_KEY_ENV,
                promptsplit_config::CONFIG_FILE_NAME
            ))
        })?;

        Self::new(
            config.api_url.clone(),
            api_key,
            config.default_model.clone(),
            HttpParams::default(),
        )
    }

    fn resolve_model(&self, request: &ChatRequest) -> String {
        if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|msg| WireMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl LlmBackend for ChatBackend {
    async fn invoke(&self, request: ChatRequest) -> Result<LlmResult, LlmError> {
        request.validate()?;

        let model = self.resolve_model(&request);
        debug!(
            model = %model,
            messages = request.messages.len(),
            timeout_secs = request.timeout.as_secs(),
            "invoking chat backend"
        );

        let body = WireRequest {
            model: model.clone(),
            messages: Self::convert_messages(&request.messages),
            max_tokens: request.max_tokens.unwrap_or(self.default_params.max_tokens),
            temperature: request
                .temperature
                .unwrap_or(self.default_params.temperature),
            stream: false,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let detail = redact_error_message(&e.to_string());
                if e.is_timeout() {
                    LlmError::Network(format!("request timed out: {detail}"))
                } else {
                    LlmError::Network(format!("request failed: {detail}"))
                }
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            LlmError::Network(format!(
                "failed to read response body: {}",
                redact_error_message(&e.to_string())
            ))
        })?;

        let text = std::str::from_utf8(&bytes)
            .map_err(|e| LlmError::Encoding(format!("response body is not UTF-8: {e}")))?;

        if status != StatusCode::OK {
            return Err(classify_status(status, text));
        }

        let parsed: WireResponse = serde_json::from_str(text)
            .map_err(|e| LlmError::Parse(format!("response body is not valid JSON: {e}")))?;

        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| LlmError::Parse("response missing choices[0]".to_string()))?;
        let content = choice
            .message
            .content
            .as_deref()
            .ok_or_else(|| {
                LlmError::Parse("response missing content in choices[0].message".to_string())
            })?
            .trim()
            .to_string();

        let mut result = LlmResult::new(content, model);
        if let Some(usage) = parsed.usage {
            result.tokens_input = Some(usage.prompt_tokens);
            result.tokens_output = Some(usage.completion_tokens);
        }

        debug!(
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "chat invocation completed"
        );

        Ok(result)
    }
}

/// Map a non-200 status to its error kind.
///
/// The body excerpt is redacted and truncated before it lands in the message.
#[must_use]
pub fn classify_status(status: StatusCode, body: &str) -> LlmError {
    let excerpt: String = redact_error_message(body)
        .chars()
        .take(BODY_EXCERPT_LEN)
        .collect();

    match status {
        StatusCode::UNAUTHORIZED => LlmError::Auth(excerpt),
        StatusCode::BAD_REQUEST => LlmError::InvalidRequest(excerpt),
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimit(excerpt),
        StatusCode::FORBIDDEN => LlmError::QuotaExceeded(excerpt),
        s if s.is_server_error() => LlmError::Server {
            status: s.as_u16(),
            message: excerpt,
        },
        s => LlmError::Unknown(format!("unexpected status {s}: {excerpt}")),
    }
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WireResponseMessage {
    #[allow(dead_code)]
    role: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

//! Core message and invocation types shared by all backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LlmError;

/// Message role in a chat conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One request to a chat-completions backend.
///
/// `model` empty means "use the backend default". The timeout bounds the
/// single HTTP exchange, not the retry loop around it.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: String::new(),
            messages,
            timeout: Duration::from_secs(30),
            temperature: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Validate that every message carries a known role and non-empty content.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` for an empty message list or a
    /// message with empty content.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.messages.is_empty() {
            return Err(LlmError::InvalidRequest(
                "message list must not be empty".to_string(),
            ));
        }
        for (i, msg) in self.messages.iter().enumerate() {
            if msg.content.is_empty() && msg.role != Role::User {
                return Err(LlmError::InvalidRequest(format!(
                    "message {i} ({}) has empty content",
                    msg.role.as_str()
                )));
            }
        }
        Ok(())
    }
}

/// Result of a successful backend invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    /// Assistant text from the first choice, trimmed
    pub content: String,
    /// Model that actually served the request
    pub model_used: String,
    /// Prompt tokens consumed, when the provider reports usage
    pub tokens_input: Option<u64>,
    /// Completion tokens consumed, when the provider reports usage
    pub tokens_output: Option<u64>,
}

impl LlmResult {
    pub fn new(content: impl Into<String>, model_used: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }
}

/// Trait for LLM backends.
///
/// One implementation speaks HTTP ([`crate::http::ChatBackend`]); tests
/// substitute scripted fakes.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn invoke(&self, request: ChatRequest) -> Result<LlmResult, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(Message::system("a").role, Role::System);
        assert_eq!(Message::user("b").role, Role::User);
        assert_eq!(Message::assistant("c").role, Role::Assistant);
    }

    #[test]
    fn validate_rejects_empty_message_list() {
        let req = ChatRequest::new(vec![]);
        assert!(matches!(
            req.validate(),
            Err(LlmError::InvalidRequest(_))
        ));
    }

    #[test]
    fn validate_allows_empty_user_content() {
        // Some prompts put everything in the system message and send an
        // empty user turn.
        let req = ChatRequest::new(vec![Message::system("prompt"), Message::user("")]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_system_content() {
        let req = ChatRequest::new(vec![Message::system("")]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn chat_request_builder_chains() {
        let req = ChatRequest::new(vec![Message::user("hi")])
            .with_model("m1")
            .with_timeout(Duration::from_secs(5))
            .with_temperature(0.2)
            .with_max_tokens(512);
        assert_eq!(req.model, "m1");
        assert_eq!(req.timeout, Duration::from_secs(5));
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, Some(512));
    }
}

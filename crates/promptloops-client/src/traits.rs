use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::{Credential, Message};

/// Default chat-completion endpoint
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Token budget used when the caller does not ask for one
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Sampling temperature sent with every request
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Model used for both generation and validation unless configured otherwise
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

const DATA_POLICY_GUIDANCE: &str = "Please configure your data policy settings at https://openrouter.ai/settings/privacy to allow the selected model, or try a different model.";

/// Errors that can occur during a completion round trip
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("{message}")]
    RequestFailed { status: u16, message: String },

    #[error("No response from AI model. Please try again.")]
    EmptyCompletion,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid completion request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Build a `RequestFailed` from a non-success response.
    ///
    /// The backend's own message wins; otherwise a human message is chosen
    /// from the status code.
    pub fn from_status(status: u16, status_text: &str, backend_message: Option<String>) -> Self {
        let message = match backend_message.filter(|m| !m.trim().is_empty()) {
            Some(message) => with_data_policy_guidance(message),
            None => match status {
                401 => "Invalid API key. Please check your OpenRouter API key.".to_string(),
                429 => "Rate limit exceeded. Please try again later.".to_string(),
                500 => "Server error. Please try again later.".to_string(),
                _ => format!("API request failed: {}", status_text),
            },
        };
        ClientError::RequestFailed { status, message }
    }

    /// HTTP status for request failures
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn with_data_policy_guidance(message: String) -> String {
    if message.to_lowercase().contains("data policy") {
        format!("{}\n\n{}", message, DATA_POLICY_GUIDANCE)
    } else {
        message
    }
}

/// Transport configuration shared by every request a client makes
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Chat-completion URL
    pub endpoint: String,
    /// Sent as `HTTP-Referer`
    pub referer: String,
    /// Sent as `X-Title`
    pub title: String,
    pub temperature: f64,
    /// Optional request timeout (None = no limit)
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            referer: "http://localhost".to_string(),
            title: "AI Prompt Builder".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Base URL of the API, used to derive sibling routes like `/models`
    pub fn api_base(&self) -> &str {
        self.endpoint
            .strip_suffix("/chat/completions")
            .unwrap_or(&self.endpoint)
    }
}

/// Inputs for a single completion
#[derive(Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub credential: &'a Credential,
    pub max_tokens: Option<u32>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [Message], credential: &'a Credential) -> Self {
        Self {
            model,
            messages,
            credential,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Check the preconditions every backend relies on
    pub fn check(&self) -> Result<(), ClientError> {
        if self.messages.is_empty() {
            return Err(ClientError::InvalidRequest(
                "at least one message is required".into(),
            ));
        }
        if self.credential.is_empty() {
            return Err(ClientError::InvalidRequest("credential is empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ClientError::InvalidRequest("model id is empty".into()));
        }
        Ok(())
    }
}

/// A backend able to turn a conversation into assistant text
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Human-readable backend name (e.g., "OpenRouter")
    fn name(&self) -> &str;

    /// Issue one completion and return the assistant text
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages_without_backend_text() {
        let err = ClientError::from_status(401, "Unauthorized", None);
        assert_eq!(
            err.to_string(),
            "Invalid API key. Please check your OpenRouter API key."
        );
        assert_eq!(err.status(), Some(401));

        let err = ClientError::from_status(429, "Too Many Requests", None);
        assert!(err.to_string().starts_with("Rate limit exceeded"));

        let err = ClientError::from_status(500, "Internal Server Error", None);
        assert!(err.to_string().starts_with("Server error"));

        let err = ClientError::from_status(503, "Service Unavailable", Some("  ".into()));
        assert_eq!(err.to_string(), "API request failed: Service Unavailable");
    }

    #[test]
    fn test_backend_message_preferred() {
        let err = ClientError::from_status(401, "Unauthorized", Some("No auth credentials found".into()));
        assert_eq!(err.to_string(), "No auth credentials found");
    }

    #[test]
    fn test_data_policy_guidance_appended() {
        let err = ClientError::from_status(
            404,
            "Not Found",
            Some("No endpoints found matching your Data Policy".into()),
        );
        let message = err.to_string();
        assert!(message.starts_with("No endpoints found matching your Data Policy\n\n"));
        assert!(message.contains("settings/privacy"));
    }

    #[test]
    fn test_api_base() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base(), "https://openrouter.ai/api/v1");

        let config = ClientConfig::default().with_endpoint("http://127.0.0.1:9000/v1");
        assert_eq!(config.api_base(), "http://127.0.0.1:9000/v1");
    }

    #[test]
    fn test_request_preconditions() {
        let credential = Credential::new_unchecked("sk-or-v1-x");
        let empty = Credential::new_unchecked("");
        let messages = vec![Message::user("hi")];

        assert!(CompletionRequest::new("m", &messages, &credential).check().is_ok());
        assert!(CompletionRequest::new("m", &[], &credential).check().is_err());
        assert!(CompletionRequest::new("m", &messages, &empty).check().is_err());
        assert!(CompletionRequest::new(" ", &messages, &credential).check().is_err());
    }
}

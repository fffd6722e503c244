use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::{ClientConfig, ClientError, CompletionClient, CompletionRequest, Message, DEFAULT_MAX_TOKENS};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<ProviderPreferences>,
}

/// Routing preferences required by free model variants
#[derive(Debug, Serialize)]
struct ProviderPreferences {
    data_collection: &'static str,
    allow_fallbacks: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// OpenRouter-compatible chat-completion backend
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    config: ClientConfig,
}

impl OpenRouterClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn with_http_client(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn http_client(&self) -> &Client {
        &self.client
    }

    fn build_body<'a>(&self, request: &CompletionRequest<'a>) -> ChatRequest<'a> {
        let provider = request.model.contains(":free").then_some(ProviderPreferences {
            data_collection: "allow",
            allow_fallbacks: true,
        });
        ChatRequest {
            model: request.model,
            messages: request.messages,
            temperature: self.config.temperature,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            provider,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    fn name(&self) -> &str {
        "OpenRouter"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ClientError> {
        request.check()?;

        let body = self.build_body(&request);
        let start = Instant::now();

        debug!(
            model = request.model,
            messages = request.messages.len(),
            max_tokens = body.max_tokens,
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(request.credential.expose())
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !status.is_success() {
            let backend_message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message);
            let err = ClientError::from_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown status"),
                backend_message,
            );
            warn!(status = status.as_u16(), model = request.model, "Completion request failed");
            return Err(err);
        }

        let content = serde_json::from_str::<ChatResponse>(&text)
            .ok()
            .and_then(|parsed| parsed.choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ClientError::EmptyCompletion)?;

        debug!(
            model = request.model,
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Completion received"
        );

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Credential;
    use mockito::Matcher;
    use serde_json::json;

    const PATH: &str = "/api/v1/chat/completions";

    async fn setup() -> (OpenRouterClient, mockito::ServerGuard) {
        let server = mockito::Server::new_async().await;
        let config = ClientConfig::default().with_endpoint(format!("{}{}", server.url(), PATH));
        let client = OpenRouterClient::new(config).unwrap();
        (client, server)
    }

    fn credential() -> Credential {
        Credential::parse("sk-or-v1-test").unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_assistant_text() {
        let (client, mut server) = setup().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("authorization", "Bearer sk-or-v1-test")
            .match_header("x-title", "AI Prompt Builder")
            .match_body(Matcher::PartialJson(json!({
                "model": "google/gemini-2.0-flash-001",
                "temperature": 0.7,
                "max_tokens": 2048,
                "messages": [
                    {"role": "system", "content": "You write haiku."},
                    {"role": "user", "content": "Write one"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"gen-1","choices":[{"message":{"role":"assistant","content":"Waves fold into foam"}}]}"#)
            .create_async()
            .await;

        let messages = vec![Message::system("You write haiku."), Message::user("Write one")];
        let credential = credential();
        let text = client
            .complete(CompletionRequest::new(
                "google/gemini-2.0-flash-001",
                &messages,
                &credential,
            ))
            .await
            .unwrap();

        assert_eq!(text, "Waves fold into foam");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_custom_max_tokens_and_free_model_routing() {
        let (client, mut server) = setup().await;
        let mock = server
            .mock("POST", PATH)
            .match_body(Matcher::PartialJson(json!({
                "max_tokens": 3000,
                "provider": {"data_collection": "allow", "allow_fallbacks": true}
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"ok"}}]}"#)
            .create_async()
            .await;

        let messages = vec![Message::user("hi")];
        let credential = credential();
        let request = CompletionRequest::new("meta-llama/llama-3.3-70b-instruct:free", &messages, &credential)
            .with_max_tokens(3000);
        assert_eq!(client.complete(request).await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_without_body_maps_to_invalid_key() {
        let (client, mut server) = setup().await;
        server
            .mock("POST", PATH)
            .with_status(401)
            .with_body("")
            .create_async()
            .await;

        let messages = vec![Message::user("hi")];
        let credential = credential();
        let err = client
            .complete(CompletionRequest::new("m", &messages, &credential))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().starts_with("Invalid API key"));
    }

    #[tokio::test]
    async fn test_backend_error_message_and_data_policy() {
        let (client, mut server) = setup().await;
        server
            .mock("POST", PATH)
            .with_status(404)
            .with_body(r#"{"error":{"message":"No endpoints found matching your data policy","code":404}}"#)
            .create_async()
            .await;

        let messages = vec![Message::user("hi")];
        let credential = credential();
        let err = client
            .complete(CompletionRequest::new("m", &messages, &credential))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("No endpoints found matching your data policy"));
        assert!(message.contains("openrouter.ai/settings/privacy"));
    }

    #[tokio::test]
    async fn test_rate_limited_with_unrelated_body() {
        let (client, mut server) = setup().await;
        server
            .mock("POST", PATH)
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let messages = vec![Message::user("hi")];
        let credential = credential();
        let err = client
            .complete(CompletionRequest::new("m", &messages, &credential))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::RequestFailed {
                status: 429,
                message: "Rate limit exceeded. Please try again later.".into()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_choices_is_empty_completion() {
        let (client, mut server) = setup().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let messages = vec![Message::user("hi")];
        let credential = credential();
        let err = client
            .complete(CompletionRequest::new("m", &messages, &credential))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::EmptyCompletion);
    }

    #[tokio::test]
    async fn test_null_content_is_empty_completion() {
        let (client, mut server) = setup().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":null}}]}"#)
            .create_async()
            .await;

        let messages = vec![Message::user("hi")];
        let credential = credential();
        let err = client
            .complete(CompletionRequest::new("m", &messages, &credential))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::EmptyCompletion);
    }

    #[tokio::test]
    async fn test_empty_messages_rejected_before_network() {
        let (client, mut server) = setup().await;
        let mock = server.mock("POST", PATH).expect(0).create_async().await;

        let credential = credential();
        let err = client
            .complete(CompletionRequest::new("m", &[], &credential))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        mock.assert_async().await;
    }
}

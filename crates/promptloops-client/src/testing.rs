//! In-process `CompletionClient` for tests in this and dependent crates.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::{ClientError, CompletionClient, CompletionRequest, Message, Role};

type Responder = Box<dyn Fn(&[Message]) -> Result<String, ClientError> + Send + Sync>;
type Delay = Box<dyn Fn(&[Message]) -> Option<Duration> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub messages: Vec<Message>,
}

/// Replies from a script and records every request it is sent
pub struct ScriptedClient {
    responder: Responder,
    delay: Option<Delay>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    /// Replies in order; runs out into `EmptyCompletion`
    pub fn new(replies: Vec<Result<String, ClientError>>) -> Self {
        let replies = Mutex::new(VecDeque::from(replies));
        Self::routed(move |_| {
            replies
                .lock()
                .map(|mut r| r.pop_front())
                .ok()
                .flatten()
                .unwrap_or(Err(ClientError::EmptyCompletion))
        })
    }

    /// Replies computed from the conversation
    pub fn routed(
        responder: impl Fn(&[Message]) -> Result<String, ClientError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(
        mut self,
        delay: impl Fn(&[Message]) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ClientError> {
        request.check()?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model: request.model.to_string(),
                max_tokens: request.max_tokens,
                messages: request.messages.to_vec(),
            });
        }

        if let Some(delay) = self.delay.as_ref().and_then(|d| d(request.messages)) {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(request.messages)
    }
}

/// Content of the last user message
pub fn user_text(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::adapter::CompletionBackend;

const SYSTEM_PROMPT: &str = "You are an AI expert in sentiment analysis.";

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("upstream response contained no choices")]
    MissingChoice,
}

/// Client for the remote chat-completion provider. Stateless aside from the
/// credential; one outbound call per request, no retry.
pub struct CompletionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl CompletionClient {
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            max_tokens,
        })
    }

    fn build_request(&self, text: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Analyze the sentiment of the following text: {text}"),
                },
            ],
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    #[tracing::instrument(skip(self, text), fields(model = %self.model, text_len = text.len()))]
    async fn complete(&self, text: &str) -> Result<String, CompletionError> {
        let body = self.build_request(text);

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            // Deliberate pass-through: the caller sees the provider's status
            // and raw body unmodified.
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "completion provider error");
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = resp.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::MissingChoice)?;
        Ok(choice.message.content)
    }
}

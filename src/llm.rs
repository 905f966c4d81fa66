//! Chat-completion client
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (Groq by default).
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::LlmConfig;
use crate::error::AskError;
use crate::models::Turn;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// A language model that turns an ordered message list into one reply
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[Turn], temperature: Option<f32>) -> Result<String>;
}

/// Reusable chat-completion client (connection-pooled)
pub struct GroqClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GroqClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.api_base),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, messages: &[Turn], temperature: Option<f32>) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AskError::LlmError(
                "GROQ_API_KEY not configured".to_string(),
            ));
        }

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature,
        };

        debug!(model = %self.model, messages = messages.len(), "Calling chat completion API");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat completion request failed: {}", e);
                AskError::LlmError(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Chat completion error response ({}): {}", status, error_text);
            return Err(AskError::LlmError(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat completion response: {}", e);
            AskError::LlmError(format!("parse error: {}", e))
        })?;

        extract_answer(completion)
    }
}

fn extract_answer(completion: CompletionResponse) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AskError::LlmError("Empty response from model".to_string()))
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

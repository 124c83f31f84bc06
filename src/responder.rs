//! Drafting replies with a chat-completion model.
//!
//! [`build_messages`] lays out the prompt: a fixed system instruction, then
//! the new issue followed by every similar ticket numbered in the order the
//! index returned them. [`ChatResponder`] sends it to an OpenAI-compatible
//! `POST /chat/completions` endpoint and hands back the text verbatim.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::models::{SimilarTicketMatch, TicketMetadata};

pub const SYSTEM_PROMPT: &str = "You are a technical support specialist. Use the similar support tickets provided to generate a helpful response.";

/// Drafts a reply to a new issue given similar past tickets.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, issue: &str, similar: &[SimilarTicketMatch]) -> Result<String>;
}

/// One chat message in the completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("N/A")
}

fn format_similar(position: usize, meta: &TicketMetadata) -> String {
    let products = meta
        .product_names
        .as_ref()
        .map(|p| p.join(", "))
        .unwrap_or_default();
    format!(
        "Similar Issue {}:\nSubject: {}\nPriority: {}\nProducts: {}\nIssue: {}",
        position,
        or_na(&meta.subject),
        or_na(&meta.priority),
        products,
        or_na(&meta.body)
    )
}

/// Builds the system + user messages for a completion request.
///
/// With no similar tickets the "Similar tickets" section is left empty.
pub fn build_messages(issue: &str, similar: &[SimilarTicketMatch]) -> Vec<ChatMessage> {
    let context = similar
        .iter()
        .enumerate()
        .map(|(i, m)| format_similar(i + 1, &m.metadata))
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        ChatMessage::new("system", SYSTEM_PROMPT.to_string()),
        ChatMessage::new(
            "user",
            format!("New support ticket: {}\n\nSimilar tickets:\n{}", issue, context),
        ),
    ]
}

/// Responder backed by an OpenAI-compatible chat completions API.
pub struct ChatResponder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatResponder {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("TOGETHER_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Responder for ChatResponder {
    async fn respond(&self, issue: &str, similar: &[SimilarTicketMatch]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": build_messages(issue, similar),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("completion API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("completion API returned invalid JSON")?;
        let text = parse_completion_response(&json)?;

        tracing::debug!(model = %self.model, chars = text.len(), "generated response");
        Ok(text)
    }
}

/// Extracts `choices[0].message.content` from a chat completion response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow::anyhow!("invalid completion response: missing choices[0].message.content")
        })
}

//! Email delivery through a webhook relay.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::NotifierConfig;

/// Hands a message to whatever delivers it to the ticket submitter.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns once the relay has accepted the message.
    async fn notify(&self, email: &str, subject: &str, body: &str) -> Result<()>;
}

/// Payload posted to the webhook.
#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    email: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts `{"email", "subject", "body"}` to a webhook (e.g. a Zapier catch hook).
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let url = config
            .webhook_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ZAPIER_WEBHOOK_URL environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, email: &str, subject: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmailPayload {
                email,
                subject,
                body,
            })
            .send()
            .await
            .context("webhook request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("webhook returned {}: {}", status, body_text);
        }

        tracing::debug!(%status, "webhook accepted notification");
        Ok(())
    }
}

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Slack-compatible webhook for exit alerts. Best-effort; callers log and
/// move on when it fails.
#[derive(Clone)]
pub struct Notifier {
    webhook_url: String,
    http: Client,
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

impl Notifier {
    /// `Ok(None)` when no webhook is configured.
    pub fn from_url(webhook_url: Option<String>, timeout: Duration) -> Result<Option<Self>> {
        let Some(webhook_url) = webhook_url else {
            return Ok(None);
        };
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building webhook http client")?;
        Ok(Some(Self { webhook_url, http }))
    }

    pub async fn alert(&self, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&SlackPayload { text })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("webhook failed: {}", resp.status()));
        }
        Ok(())
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use std::time::Duration;

use trend_core::error::DeliveryError;
use trend_core::report::{Report, ReportSink};

use crate::discord::dto::{Embed, MAX_EMBEDS_PER_MESSAGE, WebhookPayload};

/// Posts reports to a Discord channel webhook. Without a URL every send fails
/// with `NotConfigured`.
#[derive(Clone)]
pub struct DiscordWebhook {
    client: Client,
    webhook_url: Option<String>,
}

impl DiscordWebhook {
    pub fn new(webhook_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Discord HTTP client")?;

        Ok(Self {
            client,
            webhook_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn send_text(&self, message: &str) -> Result<(), DeliveryError> {
        self.post(&WebhookPayload {
            content: Some(message.to_string()),
            ..Default::default()
        })
        .await
    }

    async fn post(&self, payload: &WebhookPayload) -> Result<(), DeliveryError> {
        let url = self.webhook_url.as_deref().ok_or_else(|| {
            error!("Discord webhook URL not configured. Set DISCORD_WEBHOOK_URL.");
            DeliveryError::NotConfigured
        })?;

        let resp = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        let status = resp.status();
        debug!("📡 Discord response status: {}", status);
        if status.is_success() {
            return Ok(());
        }

        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ReportSink for DiscordWebhook {
    async fn send(&self, report: &Report) -> Result<(), DeliveryError> {
        if report.is_empty() {
            return Err(DeliveryError::EmptyReport);
        }

        let description = format!(
            "Updated {}",
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let embeds: Vec<Embed> = report
            .entries
            .iter()
            .map(|entry| Embed::from_analysis(entry, &description))
            .collect();

        let chunks = embeds.chunks(MAX_EMBEDS_PER_MESSAGE).count();
        for (i, chunk) in embeds.chunks(MAX_EMBEDS_PER_MESSAGE).enumerate() {
            let payload = WebhookPayload {
                content: None,
                embeds: chunk.to_vec(),
            };
            self.post(&payload).await?;
            info!(
                "Sent Discord message {}/{} with {} embeds",
                i + 1,
                chunks,
                chunk.len()
            );
        }

        Ok(())
    }
}

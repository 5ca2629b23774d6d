// src/notify/discord.rs
use super::{Digest, Notifier, StatusReport};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Posts embeds to a Discord webhook. One attempt per message.
#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post(&self, source: &str, payload: &DiscordWebhookPayload) -> Result<()> {
        let res = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await;

        let err = match res {
            Ok(rsp) => match rsp.error_for_status_ref() {
                Ok(_) => return Ok(()),
                Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
            },
            Err(e) => anyhow!("Discord webhook request failed: {e}"),
        };
        counter!("vacancy_notify_errors_total", "source" => source.to_string()).increment(1);
        warn!(%source, error = %err, "notification not delivered");
        Err(err)
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_digest(&self, digest: &Digest) -> Result<()> {
        let payload = DiscordWebhookPayload::embed(DiscordEmbed {
            title: digest.title(),
            description: digest.description(),
            color: digest.color,
            timestamp: Some(Utc::now().to_rfc3339()),
            footer: Some(DiscordFooter {
                text: digest.footer(),
            }),
        });
        self.post(&digest.source_id, &payload).await?;
        info!(source = %digest.source_id, count = digest.records.len(), "digest sent");
        Ok(())
    }

    async fn send_status(&self, status: &StatusReport) -> Result<()> {
        let payload = DiscordWebhookPayload::embed(DiscordEmbed {
            title: status.title(),
            description: status.description(),
            color: status.color(),
            timestamp: Some(Utc::now().to_rfc3339()),
            footer: None,
        });
        self.post(&status.source_id, &payload).await?;
        info!(source = %status.source_id, listed = status.listed, "daily status sent");
        Ok(())
    }
}

#[derive(Serialize)]
struct DiscordFooter {
    text: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<DiscordFooter>,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(embed: DiscordEmbed) -> Self {
        Self {
            content: None,
            embeds: vec![embed],
        }
    }
}

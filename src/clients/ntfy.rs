use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use crate::{models::message::NotificationMessage, worker::handler::ChannelHandler};

/// Push delivery through an ntfy server: one POST per notification, no retry.
pub struct NtfyClient {
    http_client: Client,
    base_url: String,
    topic: String,
}

impl NtfyClient {
    pub fn new(base_url: &str, topic: &str, request_timeout: Duration) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        info!(base_url, topic, "ntfy client initialized");

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            topic: topic.to_string(),
        })
    }

    pub async fn send_push(&self, title: &str, priority: &str, body: &str) -> Result<(), Error> {
        let url = format!("{}/{}", self.base_url, self.topic);

        debug!(url = %url, title, priority, "Sending push notification");

        let response = self
            .http_client
            .post(&url)
            .header("Title", title)
            .header("X-Priority", priority)
            .header("Content-Type", "text/plain")
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::OK || status == StatusCode::ACCEPTED {
            debug!(status = status.as_u16(), "Push notification accepted");
            Ok(())
        } else {
            Err(anyhow!(
                "Failed to send push notification, status code: {}",
                status.as_u16()
            ))
        }
    }
}

#[async_trait]
impl ChannelHandler for NtfyClient {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), Error> {
        self.send_push(&message.title, &message.priority, &message.message)
            .await
    }
}

use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::{
    models::{channel::ChannelType, message::NotificationMessage},
    worker::handler::ChannelHandler,
};

/// Forwards the notification as JSON to an email or SMS provider endpoint.
pub struct ProviderRelay {
    http_client: Client,
    channel: ChannelType,
    endpoint: String,
}

impl ProviderRelay {
    pub fn new(channel: ChannelType, endpoint: &str, request_timeout: Duration) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        info!(channel = %channel, endpoint, "Provider relay initialized");

        Ok(Self {
            http_client,
            channel,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ChannelHandler for ProviderRelay {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), Error> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(message)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            debug!(
                channel = %self.channel,
                notification_id = message.notification_id,
                "Provider accepted notification"
            );
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(anyhow!(
                "{} provider returned status {}: {}",
                self.channel,
                status.as_u16(),
                error_text
            ))
        }
    }
}

/// Stand-in for a channel with no provider configured: logs and succeeds.
pub struct LoggingHandler {
    channel: ChannelType,
}

impl LoggingHandler {
    pub fn new(channel: ChannelType) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChannelHandler for LoggingHandler {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), Error> {
        info!(
            channel = %self.channel,
            notification_id = message.notification_id,
            user_id = %message.user_id,
            title = %message.title,
            "No provider configured, notification logged only"
        );
        Ok(())
    }
}

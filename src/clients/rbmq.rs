use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties,
    options::{BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions},
};
use tracing::{debug, info, warn};

use crate::{
    clients::topology::{Topology, TopologyManager},
    models::retry::RetryConfig,
    service::Publisher,
    utils::retry_with_backoff,
};

const PERSISTENT: u8 = 2;

pub struct RabbitMqClient {
    connection: Connection,
    channel: Channel,
}

impl RabbitMqClient {
    /// Dials the broker, retrying per `retry` before giving up.
    pub async fn connect(rabbitmq_url: &str, retry: &RetryConfig) -> Result<Self, Error> {
        info!("Connecting to RabbitMQ");

        let connection = retry_with_backoff(retry, || {
            Connection::connect(rabbitmq_url, ConnectionProperties::default())
        })
        .await
        .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        info!("RabbitMQ connection established");

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        debug!("RabbitMQ channel created");

        Ok(Self {
            connection,
            channel,
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    pub async fn set_prefetch(&self, prefetch_count: u16) -> Result<(), Error> {
        self.channel
            .basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set up QoS: {}", e))?;

        debug!(prefetch_count, "Prefetch count set");

        Ok(())
    }

    /// Closes channel then connection. Errors are logged, never returned.
    pub async fn close(&self) {
        if let Err(e) = self.channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "Error closing RabbitMQ channel");
        }

        if let Err(e) = self.connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "Error closing RabbitMQ connection");
        }
    }
}

/// Publishes wire payloads to the topic exchange with publisher confirms.
///
/// Nothing is buffered: a publish either lands in the broker or returns an
/// error to the caller.
pub struct Producer {
    client: RabbitMqClient,
    exchange: String,
    retry: RetryConfig,
    closed: AtomicBool,
}

impl Producer {
    pub async fn connect(
        rabbitmq_url: &str,
        topology: Topology,
        connect_retry: &RetryConfig,
        publish_retry: RetryConfig,
    ) -> Result<Self, Error> {
        let client = RabbitMqClient::connect(rabbitmq_url, connect_retry).await?;

        client
            .channel()
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to enable publisher confirms: {}", e))?;

        let exchange = topology.exchange.clone();
        TopologyManager::new(topology).setup(client.channel()).await?;

        Ok(Self {
            client,
            exchange,
            retry: publish_retry,
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), Error> {
        retry_with_backoff(&self.retry, || self.publish_once(routing_key, payload))
            .await
            .map_err(|e| anyhow!("Failed to publish message with routing key {}: {}", routing_key, e))?;

        debug!(exchange = %self.exchange, routing_key, "Message published");

        Ok(())
    }

    async fn publish_once(&self, routing_key: &str, payload: &[u8]) -> Result<(), Error> {
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type("application/json".into());

        let confirmation = self
            .client
            .channel()
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            return Err(anyhow!("Broker refused the message"));
        }

        Ok(())
    }

    /// Releases the channel and connection. Later calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.client.close().await;

        info!("Producer closed");
    }
}

#[async_trait]
impl Publisher for Producer {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), Error> {
        Producer::publish(self, routing_key, payload).await
    }
}

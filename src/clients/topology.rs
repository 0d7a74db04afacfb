use anyhow::{Error, Result, anyhow};
use lapin::{
    Channel, ExchangeKind,
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable, LongString},
};
use tracing::{debug, info};

use crate::models::channel::ChannelType;

/// Exchange, queue and binding names shared by the producer and the consumer.
#[derive(Debug, Clone)]
pub struct Topology {
    pub dead_letter_exchange: String,
    pub dead_letter_routing_key: String,
    pub dead_letter_queue: String,
    pub exchange: String,
    pub channels: Vec<ChannelType>,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            dead_letter_exchange: "dead_letter_exchange".to_string(),
            dead_letter_routing_key: "dead_letter".to_string(),
            dead_letter_queue: "dead_letter_queue".to_string(),
            exchange: "notification_exchange_topic".to_string(),
            channels: ChannelType::ALL.to_vec(),
        }
    }
}

impl Topology {
    pub fn is_dead_letter_queue(&self, queue_name: &str) -> bool {
        queue_name == self.dead_letter_queue
    }

    /// Every queue a worker drains: the dead-letter queue first, then one per channel.
    pub fn consumer_queues(&self) -> Vec<String> {
        std::iter::once(self.dead_letter_queue.clone())
            .chain(self.channels.iter().map(ChannelType::queue_name))
            .collect()
    }

    /// Arguments every channel queue is declared with. Redeclaring a queue
    /// with different arguments is refused by the broker.
    pub fn dead_letter_arguments(&self) -> FieldTable {
        let mut args = FieldTable::default();
        args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(LongString::from(self.dead_letter_exchange.as_str())),
        );
        args.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(LongString::from(self.dead_letter_routing_key.as_str())),
        );
        args
    }

    pub fn queue_arguments(&self, queue_name: &str) -> FieldTable {
        if self.is_dead_letter_queue(queue_name) {
            FieldTable::default()
        } else {
            self.dead_letter_arguments()
        }
    }
}

pub struct TopologyManager {
    topology: Topology,
}

impl TopologyManager {
    pub fn new(topology: Topology) -> Self {
        Self { topology }
    }

    /// Declares the dead-letter path, the topic exchange and one queue per
    /// channel. Any failure is returned as-is: a declaration error means the
    /// broker disagrees with this topology, and retrying will not fix it.
    pub async fn setup(&self, channel: &Channel) -> Result<(), Error> {
        let topology = &self.topology;

        channel
            .exchange_declare(
                &topology.dead_letter_exchange,
                ExchangeKind::Direct,
                durable_exchange(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare dead-letter exchange: {}", e))?;

        channel
            .queue_declare(
                &topology.dead_letter_queue,
                durable_queue(),
                topology.queue_arguments(&topology.dead_letter_queue),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare dead-letter queue: {}", e))?;

        channel
            .queue_bind(
                &topology.dead_letter_queue,
                &topology.dead_letter_exchange,
                &topology.dead_letter_routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to bind dead-letter queue: {}", e))?;

        debug!(
            exchange = %topology.dead_letter_exchange,
            queue = %topology.dead_letter_queue,
            "Dead-letter path declared"
        );

        channel
            .exchange_declare(
                &topology.exchange,
                ExchangeKind::Topic,
                durable_exchange(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare topic exchange: {}", e))?;

        for channel_type in &topology.channels {
            let queue_name = channel_type.queue_name();

            channel
                .queue_declare(
                    &queue_name,
                    durable_queue(),
                    topology.queue_arguments(&queue_name),
                )
                .await
                .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue_name, e))?;

            channel
                .queue_bind(
                    &queue_name,
                    &topology.exchange,
                    channel_type.routing_key(),
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| anyhow!("Failed to bind queue {}: {}", queue_name, e))?;

            debug!(queue = %queue_name, routing_key = channel_type.routing_key(), "Channel queue declared");
        }

        info!(
            exchange = %topology.exchange,
            queues = topology.channels.len(),
            "Broker topology ready"
        );

        Ok(())
    }
}

fn durable_exchange() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

fn durable_queue() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        exclusive: false,
        auto_delete: false,
        ..Default::default()
    }
}

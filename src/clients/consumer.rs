use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use futures_util::StreamExt;
use lapin::{
    Consumer,
    options::{BasicCancelOptions, BasicConsumeOptions},
    types::FieldTable,
};
use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    clients::{
        rbmq::RabbitMqClient,
        topology::{Topology, TopologyManager},
    },
    models::retry::RetryConfig,
    worker::{
        delivery::QueuedMessage,
        pool::{WorkerConfig, WorkerPool},
        processor::MessageProcessor,
    },
};

const SUBSCRIPTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

struct Subscription {
    queue: String,
    consumer_tag: String,
    task: JoinHandle<()>,
}

/// Subscribes to every channel queue plus the dead-letter queue and feeds a
/// [`WorkerPool`].
pub struct NotificationConsumer {
    client: Arc<RabbitMqClient>,
    topology: Topology,
    pool: Option<WorkerPool>,
    subscriptions: Vec<Subscription>,
}

impl NotificationConsumer {
    pub async fn connect(
        rabbitmq_url: &str,
        retry: &RetryConfig,
        prefetch_count: u16,
        topology: Topology,
    ) -> Result<Self, Error> {
        let client = RabbitMqClient::connect(rabbitmq_url, retry).await?;
        client.set_prefetch(prefetch_count).await?;

        Ok(Self {
            client: Arc::new(client),
            topology,
            pool: None,
            subscriptions: Vec::new(),
        })
    }

    /// Shared handle to the broker connection, for health probing.
    pub fn broker(&self) -> Arc<RabbitMqClient> {
        Arc::clone(&self.client)
    }

    pub fn processed(&self) -> u64 {
        self.pool.as_ref().map(WorkerPool::processed).unwrap_or(0)
    }

    /// Declares the topology, starts the worker pool and one fan-in task per
    /// queue. Returns once every subscription is registered.
    pub async fn start(
        &mut self,
        queues: &[String],
        config: &WorkerConfig,
        processor: Arc<MessageProcessor>,
    ) -> Result<(), Error> {
        if self.pool.is_some() {
            return Err(anyhow!("Consumer already started"));
        }

        TopologyManager::new(self.topology.clone())
            .setup(self.client.channel())
            .await?;

        let pool = WorkerPool::start(config, processor);
        let sender = pool
            .sender()
            .ok_or_else(|| anyhow!("Worker pool has no open work queue"))?;
        self.pool = Some(pool);

        for queue in queues {
            let consumer_tag = format!("notify_worker_{}_{}", queue, Uuid::new_v4().simple());

            let consumer = self
                .client
                .channel()
                .basic_consume(
                    queue,
                    &consumer_tag,
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| anyhow!("Failed to register consumer for queue {}: {}", queue, e))?;

            let task = tokio::spawn(fan_in(queue.clone(), consumer, sender.clone()));

            info!(queue = %queue, consumer_tag = %consumer_tag, "Subscribed to queue");

            self.subscriptions.push(Subscription {
                queue: queue.clone(),
                consumer_tag,
                task,
            });
        }

        Ok(())
    }

    /// Stops intake, lets workers finish everything already queued, then
    /// releases the channel and connection.
    pub async fn stop(mut self) {
        for subscription in &self.subscriptions {
            if let Err(e) = self
                .client
                .channel()
                .basic_cancel(&subscription.consumer_tag, BasicCancelOptions::default())
                .await
            {
                warn!(
                    queue = %subscription.queue,
                    error = %e,
                    "Failed to cancel subscription"
                );
            }
        }

        for mut subscription in self.subscriptions.drain(..) {
            if timeout(SUBSCRIPTION_DRAIN_TIMEOUT, &mut subscription.task)
                .await
                .is_err()
            {
                warn!(
                    queue = %subscription.queue,
                    "Subscription did not drain in time, aborting"
                );
                subscription.task.abort();
            }
        }

        if let Some(pool) = self.pool.take() {
            pool.shutdown().await;
        }

        self.client.close().await;

        info!("Consumer stopped");
    }
}

async fn fan_in(queue: String, mut consumer: Consumer, sender: mpsc::Sender<QueuedMessage>) {
    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let message = QueuedMessage::from_delivery(&queue, delivery);
                let delivery_tag = message.delivery_tag;

                if sender.send(message).await.is_err() {
                    // Unacked deliveries return to the queue when the channel closes.
                    warn!(queue = %queue, delivery_tag, "Work queue closed, delivery left unacknowledged");
                    break;
                }
            }
            Err(e) => {
                error!(queue = %queue, error = %e, "Subscription failed");
                break;
            }
        }
    }

    debug!(queue = %queue, "Subscription ended");
}

use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, error, info, warn};

use crate::{
    models::{message::NotificationMessage, retry::Backoff, status::NotificationStatus},
    store::{NotificationStore, StoreError},
    worker::{
        delivery::{Disposition, QueuedMessage},
        handler::HandlerRegistry,
    },
};

/// Decides and executes the outcome of one delivery.
pub struct MessageProcessor {
    dead_letter_queue: String,
    handlers: HandlerRegistry,
    store: Arc<dyn NotificationStore>,
    requeue_backoff: Arc<dyn Backoff>,
    message_timeout: Duration,
}

impl MessageProcessor {
    pub fn new(
        dead_letter_queue: impl Into<String>,
        handlers: HandlerRegistry,
        store: Arc<dyn NotificationStore>,
        requeue_backoff: Arc<dyn Backoff>,
        message_timeout: Duration,
    ) -> Self {
        Self {
            dead_letter_queue: dead_letter_queue.into(),
            handlers,
            store,
            requeue_backoff,
            message_timeout,
        }
    }

    /// Processes the message and settles it with the broker exactly once.
    pub async fn handle(&self, message: QueuedMessage) {
        let disposition = self.process(&message).await;
        let queue = message.queue_name.clone();
        let delivery_tag = message.delivery_tag;

        if let Err(e) = message.settle(disposition).await {
            error!(
                queue = %queue,
                delivery_tag,
                ?disposition,
                error = %e,
                "Failed to settle message with broker"
            );
        }
    }

    pub async fn process(&self, message: &QueuedMessage) -> Disposition {
        if message.queue_name == self.dead_letter_queue {
            self.inspect_dead_letter(message);
            return Disposition::Ack;
        }

        let notification = match NotificationMessage::from_slice(&message.payload) {
            Ok(notification) => notification,
            Err(e) => {
                warn!(
                    queue = %message.queue_name,
                    delivery_tag = message.delivery_tag,
                    error = %e,
                    "Malformed payload, dead-lettering"
                );
                return Disposition::DEAD_LETTER;
            }
        };

        let id = notification.notification_id;

        let Some((channel, handler)) = self.handlers.resolve(&notification.notification_type)
        else {
            warn!(
                notification_id = id,
                notification_type = %notification.notification_type,
                queue = %message.queue_name,
                "No handler for notification type, dropping"
            );
            return Disposition::Ack;
        };

        info!(
            notification_id = id,
            user_id = %notification.user_id,
            channel = %channel,
            queue = %message.queue_name,
            redelivered = message.redelivered,
            "Processing notification"
        );

        // One budget covers the handler and the status write that follows it.
        let deadline = Instant::now() + self.message_timeout;

        let outcome = match timeout_at(deadline, handler.deliver(&notification)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(anyhow::anyhow!(
                "Handler timed out after {:?}",
                self.message_timeout
            )),
        };

        if let Err(e) = outcome {
            warn!(
                notification_id = id,
                channel = %channel,
                error = %e,
                "Delivery failed, requeueing"
            );

            // The message is requeued even when the status write fails.
            if let Err(e) = self
                .update_status(id, NotificationStatus::Failed, deadline)
                .await
            {
                error!(notification_id = id, error = %e, "Failed to mark notification as failed");
            }

            sleep(self.requeue_backoff.delay(1)).await;

            return Disposition::REQUEUE;
        }

        if let Err(e) = self
            .update_status(id, NotificationStatus::Sent, deadline)
            .await
        {
            error!(
                notification_id = id,
                error = %e,
                "Delivered but status not recorded, requeueing"
            );
            return Disposition::REQUEUE;
        }

        info!(notification_id = id, channel = %channel, "Notification sent");

        Disposition::Ack
    }

    async fn update_status(
        &self,
        id: i64,
        status: NotificationStatus,
        deadline: Instant,
    ) -> Result<(), StoreError> {
        match timeout_at(deadline, self.store.update_status(id, status)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }

    fn inspect_dead_letter(&self, message: &QueuedMessage) {
        let body = String::from_utf8_lossy(&message.payload);

        match &message.dead_letter {
            Some(info) => warn!(
                queue = %message.queue_name,
                delivery_tag = message.delivery_tag,
                reason = %info.reason,
                retry_exhausted = info.reason.is_retry_exhaustion(),
                source_queue = info.source_queue.as_deref().unwrap_or("unknown"),
                death_count = info.count.unwrap_or(0),
                payload = %body,
                "Dead-lettered message needs manual inspection"
            ),
            None => warn!(
                queue = %message.queue_name,
                delivery_tag = message.delivery_tag,
                payload = %body,
                "Dead-lettered message without x-death header needs manual inspection"
            ),
        }

        debug!(delivery_tag = message.delivery_tag, "Acknowledging dead-lettered message");
    }
}

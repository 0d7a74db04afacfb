use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    models::{
        channel::ChannelType,
        message::NotificationMessage,
        notification::NewNotification,
        request::{SendNotificationRequest, StatusRequest},
        response::{SendNotificationResponse, StatusResponse},
        status::NotificationStatus,
    },
    rate_limiter::RateLimiter,
    store::{NotificationStore, StoreError},
};

/// Hands a serialized notification to the broker, routed by channel type.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("rate limiter unavailable: {0}")]
    RateLimiter(anyhow::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publish failed: {0}")]
    Publish(anyhow::Error),
}

/// Ingress path: rate check, pending insert, publish.
pub struct NotificationService {
    limiter: RateLimiter,
    store: Arc<dyn NotificationStore>,
    publisher: Arc<dyn Publisher>,
}

impl NotificationService {
    pub fn new(
        limiter: RateLimiter,
        store: Arc<dyn NotificationStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            limiter,
            store,
            publisher,
        }
    }

    /// Accepts a notification and returns its id. Acceptance does not mean
    /// delivery; callers poll [`NotificationService::status`].
    pub async fn submit(&self, request: &SendNotificationRequest) -> Result<i64, IngressError> {
        let channel = validate(request)?;

        match self.limiter.allow(&request.user_id).await {
            Ok(true) => {}
            Ok(false) => return Err(IngressError::RateLimited),
            Err(e) => {
                error!(user_id = %request.user_id, error = %e, "Rate limiter error");
                return Err(IngressError::RateLimiter(e));
            }
        }

        let id = self
            .store
            .insert(&NewNotification::pending(
                request.user_id.clone(),
                request.title.clone(),
                request.message.clone(),
                request.priority.clone(),
                channel,
            ))
            .await?;

        let payload = NotificationMessage {
            notification_id: id,
            user_id: request.user_id.clone(),
            title: request.title.clone(),
            priority: request.priority.clone(),
            message: request.message.clone(),
            notification_type: channel.as_str().to_string(),
        }
        .to_vec()?;

        if let Err(e) = self.publisher.publish(channel.routing_key(), &payload).await {
            error!(notification_id = id, error = %e, "Publish failed, marking notification failed");

            if let Err(update_err) = self
                .store
                .update_status(id, NotificationStatus::Failed)
                .await
            {
                warn!(notification_id = id, error = %update_err, "Failed to mark unpublished notification");
            }

            return Err(IngressError::Publish(e));
        }

        info!(
            notification_id = id,
            user_id = %request.user_id,
            channel = %channel,
            "Notification accepted"
        );

        Ok(id)
    }

    pub async fn send_notification(&self, request: &SendNotificationRequest) -> SendNotificationResponse {
        match self.submit(request).await {
            Ok(id) => SendNotificationResponse::accepted(id),
            Err(e) => SendNotificationResponse::rejected(e.to_string()),
        }
    }

    pub async fn status(&self, notification_id: i64) -> Result<NotificationStatus, StoreError> {
        self.store.get_status(notification_id).await
    }

    pub async fn get_status(&self, request: StatusRequest) -> StatusResponse {
        match self.status(request.notification_id).await {
            Ok(status) => StatusResponse::found(status),
            Err(e) => StatusResponse::error(e.to_string()),
        }
    }
}

fn validate(request: &SendNotificationRequest) -> Result<ChannelType, IngressError> {
    if request.user_id.trim().is_empty() {
        return Err(IngressError::InvalidRequest("user_id is required".to_string()));
    }

    if request.message.is_empty() {
        return Err(IngressError::InvalidRequest("message is required".to_string()));
    }

    request
        .notification_type
        .parse()
        .map_err(|e: anyhow::Error| IngressError::InvalidRequest(e.to_string()))
}

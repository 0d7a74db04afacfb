use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{channel::ChannelType, status::NotificationStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub channel_type: ChannelType,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied at submission; the store assigns `id` and timestamps.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub channel_type: ChannelType,
    pub status: NotificationStatus,
}

impl NewNotification {
    pub fn pending(
        user_id: String,
        title: String,
        message: String,
        priority: String,
        channel_type: ChannelType,
    ) -> Self {
        Self {
            user_id,
            title,
            message,
            priority,
            channel_type,
            status: NotificationStatus::Pending,
        }
    }
}

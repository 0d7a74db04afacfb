use async_trait::async_trait;
use thiserror::Error;

use crate::models::{notification::NewNotification, status::NotificationStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    /// No record carries this id.
    #[error("notification {0} not found")]
    NotFound(i64),

    #[error("store operation timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Durable record of notification id -> status.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Inserts the record atomically and returns its generated id.
    async fn insert(&self, notification: &NewNotification) -> Result<i64, StoreError>;

    /// Overwrites the status. Writing the current status again is not an error.
    async fn update_status(&self, id: i64, status: NotificationStatus) -> Result<(), StoreError>;

    async fn get_status(&self, id: i64) -> Result<NotificationStatus, StoreError>;
}

use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use tracing::{debug, error, info};

use crate::{
    models::{
        notification::{NewNotification, NotificationRecord},
        status::NotificationStatus,
    },
    store::{NotificationStore, StoreError},
};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Builds the pool and probes it once; an unreachable database fails here.
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self, Error> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(Some(config.max_lifetime))
            .idle_timeout(Some(config.idle_timeout))
            .acquire_timeout(config.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        let client = Self { pool };
        client.health_check().await?;

        info!("PostgreSQL connection established");

        Ok(client)
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| anyhow!("Database migration failed: {}", e))?;

        debug!("Database migrations applied");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn find(&self, id: i64) -> Result<NotificationRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, message, priority, channel_type, status, created_at, updated_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        let channel_type: String = row.try_get("channel_type")?;
        let status: String = row.try_get("status")?;

        Ok(NotificationRecord {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            priority: row.try_get("priority")?,
            channel_type: channel_type
                .parse()
                .map_err(|e: anyhow::Error| StoreError::Corrupt(e.to_string()))?,
            status: status
                .parse()
                .map_err(|e: anyhow::Error| StoreError::Corrupt(e.to_string()))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl NotificationStore for DatabaseClient {
    async fn insert(&self, notification: &NewNotification) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Dropping `tx` without commit rolls the insert back.
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (
                user_id,
                title,
                message,
                priority,
                channel_type,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.priority)
        .bind(notification.channel_type.as_str())
        .bind(notification.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!(
                error = %e,
                user_id = %notification.user_id,
                "Failed to insert notification"
            );
            StoreError::Database(e)
        })?;

        tx.commit().await?;

        debug!(notification_id = id, "Notification inserted");

        Ok(id)
    }

    async fn update_status(&self, id: i64, status: NotificationStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        debug!(notification_id = id, status = %status, "Notification status updated");

        Ok(())
    }

    async fn get_status(&self, id: i64) -> Result<NotificationStatus, StoreError> {
        let row = sqlx::query("SELECT status FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let status: String = row.try_get("status")?;

        status
            .parse()
            .map_err(|e: anyhow::Error| StoreError::Corrupt(e.to_string()))
    }
}

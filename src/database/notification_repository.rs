use crate::database::error::DatabaseError;
use crate::database::repository::NotificationStore;
use crate::payments::types::NotifyOn;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

/// Stored payment notification
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub transaction_id: String,
    pub notify_on: String,
    /// Time reported in the notification
    pub time: DateTime<Utc>,
    /// Address the notification was received from
    pub ip: String,
    /// Transaction status fetched from Sofort
    pub status: String,
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Notification about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub transaction_id: String,
    pub notify_on: NotifyOn,
    pub time: DateTime<Utc>,
    pub ip: String,
    pub status: String,
    pub status_reason: Option<String>,
}

/// Postgres-backed notification repository
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn add(&self, notification: NewNotification) -> Result<Notification, DatabaseError> {
        debug!(
            "Storing {} notification for {}",
            notification.notify_on, notification.transaction_id
        );

        sqlx::query_as::<_, Notification>(
            "INSERT INTO sofort_notifications
             (id, transaction_id, notify_on, time, ip, status, status_reason, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
             RETURNING id, transaction_id, notify_on, time, ip, status, status_reason, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&notification.transaction_id)
        .bind(notification.notify_on.as_str())
        .bind(notification.time)
        .bind(&notification.ip)
        .bind(&notification.status)
        .bind(&notification.status_reason)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e).with_context("notification insert"))
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<Notification>, DatabaseError> {
        sqlx::query_as::<_, Notification>(
            "SELECT id, transaction_id, notify_on, time, ip, status, status_reason, created_at
             FROM sofort_notifications WHERE transaction_id = $1
             ORDER BY created_at ASC",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::notification_repository::{NewNotification, Notification};
use crate::database::repository::{NotificationStore, ShopTransactionStore};
use crate::database::shop_transaction_repository::ShopTransaction;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory shop transaction store for tests and local runs.
///
/// Enforces the same unique transaction id as the Postgres table.
#[derive(Default, Clone)]
pub struct InMemoryShopTransactionStore {
    transactions: Arc<RwLock<HashMap<String, ShopTransaction>>>,
}

impl InMemoryShopTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }
}

#[async_trait]
impl ShopTransactionStore for InMemoryShopTransactionStore {
    async fn add(
        &self,
        transaction_id: &str,
        shop_id: &str,
    ) -> Result<ShopTransaction, DatabaseError> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(transaction_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueConstraintViolation {
                column: "transaction_id".to_string(),
                value: transaction_id.to_string(),
            }));
        }

        let record = ShopTransaction {
            transaction_id: transaction_id.to_string(),
            shop_id: shop_id.to_string(),
            created_at: Utc::now(),
        };
        transactions.insert(transaction_id.to_string(), record.clone());
        Ok(record)
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ShopTransaction>, DatabaseError> {
        Ok(self.transactions.read().await.get(transaction_id).cloned())
    }
}

/// In-memory notification log, kept in arrival order.
#[derive(Default, Clone)]
pub struct InMemoryNotificationStore {
    notifications: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn add(&self, notification: NewNotification) -> Result<Notification, DatabaseError> {
        let record = Notification {
            id: Uuid::new_v4(),
            transaction_id: notification.transaction_id,
            notify_on: notification.notify_on.to_string(),
            time: notification.time,
            ip: notification.ip,
            status: notification.status,
            status_reason: notification.status_reason,
            created_at: Utc::now(),
        };
        self.notifications.write().await.push(record.clone());
        Ok(record)
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<Notification>, DatabaseError> {
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| n.transaction_id == transaction_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::NotifyOn;

    #[tokio::test]
    async fn test_shop_transaction_roundtrip() {
        let store = InMemoryShopTransactionStore::new();
        store.add("1-2-3", "order-7").await.unwrap();

        let found = store.find_by_transaction("1-2-3").await.unwrap().unwrap();
        assert_eq!(found.shop_id, "order-7");
        assert!(store.find_by_transaction("9-9-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_transaction_is_rejected() {
        let store = InMemoryShopTransactionStore::new();
        store.add("1-2-3", "order-7").await.unwrap();

        let err = store.add("1-2-3", "order-8").await.unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_notifications_are_appended() {
        let store = InMemoryNotificationStore::new();
        for notify_on in [NotifyOn::Pending, NotifyOn::Received] {
            store
                .add(NewNotification {
                    transaction_id: "1-2-3".to_string(),
                    notify_on,
                    time: Utc::now(),
                    ip: "127.0.0.1".to_string(),
                    status: notify_on.to_string(),
                    status_reason: None,
                })
                .await
                .unwrap();
        }

        let found = store.find_by_transaction("1-2-3").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].notify_on, "pending");
        assert_eq!(found[1].notify_on, "received");
        assert!(store.find_by_transaction("other").await.unwrap().is_empty());
    }
}

use crate::database::error::DatabaseError;
use crate::database::notification_repository::{NewNotification, Notification};
use crate::database::shop_transaction_repository::ShopTransaction;
use async_trait::async_trait;

/// Storage for the shop id belonging to each Sofort transaction
///
/// Rows are written once by the redirect flow and never updated.
#[async_trait]
pub trait ShopTransactionStore: Send + Sync {
    async fn add(&self, transaction_id: &str, shop_id: &str)
        -> Result<ShopTransaction, DatabaseError>;

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ShopTransaction>, DatabaseError>;
}

/// Append-only log of received payment notifications
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn add(&self, notification: NewNotification) -> Result<Notification, DatabaseError>;

    /// All notifications for a transaction, oldest first
    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<Notification>, DatabaseError>;
}

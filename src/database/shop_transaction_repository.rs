use crate::database::error::DatabaseError;
use crate::database::repository::ShopTransactionStore;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::debug;

/// Link between a Sofort transaction and the shop's own order id
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ShopTransaction {
    pub transaction_id: String,
    pub shop_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Postgres-backed shop transaction repository
pub struct ShopTransactionRepository {
    pool: PgPool,
}

impl ShopTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShopTransactionStore for ShopTransactionRepository {
    async fn add(
        &self,
        transaction_id: &str,
        shop_id: &str,
    ) -> Result<ShopTransaction, DatabaseError> {
        debug!("Storing shop transaction {}", transaction_id);

        sqlx::query_as::<_, ShopTransaction>(
            "INSERT INTO sofort_shop_transactions (transaction_id, shop_id, created_at)
             VALUES ($1, $2, NOW())
             RETURNING transaction_id, shop_id, created_at",
        )
        .bind(transaction_id)
        .bind(shop_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e).with_context("shop transaction insert"))
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ShopTransaction>, DatabaseError> {
        sqlx::query_as::<_, ShopTransaction>(
            "SELECT transaction_id, shop_id, created_at
             FROM sofort_shop_transactions WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

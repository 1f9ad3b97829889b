use crate::api::AppState;
use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::notification_repository::Notification;
use crate::error::{AppError, AppResult};
use crate::payments::types::PaymentRequest;
use axum::{
    extract::{Path, State},
    response::Redirect,
    Json,
};
use serde::Serialize;

/// Open a Sofort payment and send the buyer to its payment page
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> AppResult<Redirect> {
    state.service.payment_redirect(request).await
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub shop_id: String,
    pub notifications: Vec<Notification>,
}

/// Shop id and notification history of a transaction opened here
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction): Path<String>,
) -> AppResult<Json<TransactionResponse>> {
    let shop_id = state
        .service
        .shop_id_for_transaction(&transaction)
        .await?
        .ok_or_else(|| {
            AppError::from(DatabaseError::new(DatabaseErrorKind::NotFound {
                entity: "Sofort transaction".to_string(),
                id: transaction.clone(),
            }))
        })?;
    let notifications = state.service.notifications_for(&transaction).await?;

    Ok(Json(TransactionResponse {
        transaction_id: transaction,
        shop_id,
        notifications,
    }))
}

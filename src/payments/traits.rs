//! Payment provider trait definitions
//!
//! The payment flows only talk to the provider through this trait. It exposes
//! the operations the flows need and nothing else: notification URLs and
//! request sending are sequenced by the flows, never by the host.

use crate::error::AppResult;
use crate::payments::types::{PaymentOrder, PaymentSession, StatusNotification, TransactionData};
use async_trait::async_trait;

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a payment session
    ///
    /// `order` already carries the notification URLs for every monitored
    /// status reason.
    ///
    /// # Returns
    /// * `PaymentSession` - provider transaction id and hosted payment URL
    ///
    /// # Errors
    /// * `Request` carrying the provider's error list when the provider
    ///   rejects the payment
    async fn create_payment(&self, order: &PaymentOrder) -> AppResult<PaymentSession>;

    /// Fetch the authoritative state of a transaction
    ///
    /// Notifications are only a hint that something changed; the status
    /// recorded and dispatched always comes from here.
    async fn fetch_transaction(&self, transaction: &str) -> AppResult<TransactionData>;

    /// Parse a raw webhook body
    ///
    /// # Errors
    /// * `Notification` when the body is not a status notification
    fn parse_notification(&self, body: &[u8]) -> AppResult<StatusNotification>;
}

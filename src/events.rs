//! Events handed to the host application
//!
//! Handlers are registered explicitly on an [`EventDispatcher`]. A payment
//! notification only counts as processed when at least one handler returns
//! `true` from [`PaymentEventHandler::on_notify`]; otherwise the notify flow
//! fails and the provider redelivers the notification later.

use crate::error::AppResult;
use crate::payments::types::{NotifyOn, TransactionData};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// A payment session was opened and the buyer is about to be redirected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransactionEvent {
    pub transaction: String,
    pub payment_url: String,
}

/// Sofort reported a status change for a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyEvent {
    /// Decrypted shop id from the notification URL
    pub shop_id: String,
    pub notify_on: NotifyOn,
    pub transaction: String,
    /// Notification timestamp as sent by Sofort
    pub time: DateTime<FixedOffset>,
    /// Transaction state fetched from Sofort, not taken from the webhook
    pub data: TransactionData,
}

#[async_trait]
pub trait PaymentEventHandler: Send + Sync {
    /// Informational; the return value of the redirect does not depend on it
    async fn on_new_transaction(&self, _event: &NewTransactionEvent) -> AppResult<()> {
        Ok(())
    }

    /// Return `Ok(true)` once the notification has been acted upon
    async fn on_notify(&self, event: &NotifyEvent) -> AppResult<bool>;
}

/// Ordered list of registered event handlers
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn PaymentEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn PaymentEventHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn PaymentEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn dispatch_new_transaction(&self, event: &NewTransactionEvent) -> AppResult<()> {
        debug!(
            "Dispatching NewTransaction for {} to {} handler(s)",
            event.transaction,
            self.handlers.len()
        );
        for handler in &self.handlers {
            handler.on_new_transaction(event).await?;
        }
        Ok(())
    }

    /// Every handler sees the event; returns whether any acknowledged it
    pub async fn dispatch_notify(&self, event: &NotifyEvent) -> AppResult<bool> {
        let mut handled = false;
        for handler in &self.handlers {
            handled |= handler.on_notify(event).await?;
        }

        info!(
            "Notify for {} ({}) dispatched to {} handler(s), handled={}",
            event.transaction,
            event.notify_on,
            self.handlers.len(),
            handled
        );
        Ok(handled)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

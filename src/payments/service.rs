//! Payment redirect and notification flows
//!
//! [`SofortService`] owns the sequencing the host application must not do by
//! itself: deriving the notification URLs from the encrypted shop id,
//! recording transactions and notifications, and refusing to acknowledge a
//! notification no handler took care of.

use crate::config::SofortSettings;
use crate::crypto::ShopIdCodec;
use crate::database::notification_repository::{NewNotification, Notification};
use crate::database::repository::{NotificationStore, ShopTransactionStore};
use crate::error::{AppError, AppResult};
use crate::events::{EventDispatcher, NewTransactionEvent, NotifyEvent};
use crate::payments::fees::{self, FeeConditions};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    NotificationUrl, NotifyOn, PaymentOrder, PaymentRequest, PaymentSession,
};
use axum::response::Redirect;
use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;
use tracing::{info, warn};

/// Sofort accepts at most two reason lines
pub const MAX_REASONS: usize = 2;

pub struct SofortService {
    codec: ShopIdCodec,
    notify_url: Url,
    currency: String,
    conditions: Option<FeeConditions>,
    provider: Arc<dyn PaymentProvider>,
    shop_transactions: Arc<dyn ShopTransactionStore>,
    notifications: Arc<dyn NotificationStore>,
    events: EventDispatcher,
}

impl SofortService {
    pub fn new(
        settings: &SofortSettings,
        provider: Arc<dyn PaymentProvider>,
        shop_transactions: Arc<dyn ShopTransactionStore>,
        notifications: Arc<dyn NotificationStore>,
        events: EventDispatcher,
    ) -> AppResult<Self> {
        let codec = ShopIdCodec::new(&settings.encryption_key)
            .map_err(|e| AppError::configuration(e.to_string()))?;
        let notify_url = Url::parse(&settings.notify_url).map_err(|e| {
            AppError::configuration(format!(
                "Invalid notify url '{}': {}",
                settings.notify_url, e
            ))
        })?;

        Ok(Self {
            codec,
            notify_url,
            currency: settings.currency.clone(),
            conditions: settings.conditions.clone(),
            provider,
            shop_transactions,
            notifications,
            events,
        })
    }

    pub fn conditions(&self) -> Option<&FeeConditions> {
        self.conditions.as_ref()
    }

    /// Sofort fee in cents under the configured conditions
    pub fn calculate_fee(&self, amount: i64) -> AppResult<i64> {
        fees::calculate_fee(amount, self.conditions.as_ref())
    }

    /// Amount to charge so that `amount` cents remain after the Sofort fee
    pub fn neutralize_fee(&self, amount: i64) -> AppResult<i64> {
        fees::neutralize_fee(amount, self.conditions.as_ref())
    }

    /// One notification URL per monitored status reason
    pub fn notification_urls(&self, shop_id: &str) -> AppResult<Vec<NotificationUrl>> {
        let token = self.codec.encrypt(shop_id)?;

        Ok(NotifyOn::ALL
            .iter()
            .map(|notify_on| {
                let mut url = self.notify_url.clone();
                url.query_pairs_mut()
                    .append_pair("eShopId", &token)
                    .append_pair("notifyOn", notify_on.as_str());
                NotificationUrl {
                    notify_on: *notify_on,
                    url: url.to_string(),
                }
            })
            .collect())
    }

    /// Open a payment session and record which shop id it belongs to
    ///
    /// # Errors
    /// * `InvalidState` when the request carries no shop id
    /// * `Request` when Sofort rejects the payment
    pub async fn start_payment(&self, request: PaymentRequest) -> AppResult<PaymentSession> {
        let shop_id = request
            .shop_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::invalid_state("No shop_id set."))?
            .to_string();

        if request.reasons.len() > MAX_REASONS {
            return Err(AppError::invalid_state(format!(
                "At most {} reason lines are supported, got {}",
                MAX_REASONS,
                request.reasons.len()
            )));
        }

        let order = PaymentOrder {
            amount: request.amount,
            currency: request.currency.unwrap_or_else(|| self.currency.clone()),
            reasons: request.reasons,
            user_variables: request.user_variables,
            success_url: request.success_url,
            abort_url: request.abort_url,
            timeout_url: request.timeout_url,
            notification_urls: self.notification_urls(&shop_id)?,
        };

        let session = self.provider.create_payment(&order).await?;
        self.shop_transactions
            .add(&session.transaction, &shop_id)
            .await?;

        info!(
            "Sofort transaction {} opened for shop id {}",
            session.transaction, shop_id
        );

        self.events
            .dispatch_new_transaction(&NewTransactionEvent {
                transaction: session.transaction.clone(),
                payment_url: session.payment_url.clone(),
            })
            .await?;

        Ok(session)
    }

    /// [`start_payment`](Self::start_payment), answered with a redirect to the payment page
    pub async fn payment_redirect(&self, request: PaymentRequest) -> AppResult<Redirect> {
        let session = self.start_payment(request).await?;
        Ok(Redirect::to(&session.payment_url))
    }

    /// Process one notification callback
    ///
    /// The shop id comes from the encrypted URL parameter, the status from a
    /// fresh provider lookup. Succeeds only if a handler acknowledged the
    /// resulting [`NotifyEvent`].
    pub async fn handle_notify(
        &self,
        e_shop_id: &str,
        notify_on: NotifyOn,
        ip: &str,
        body: &[u8],
    ) -> AppResult<NotifyEvent> {
        let shop_id = self.codec.decrypt(e_shop_id).map_err(|e| {
            warn!("Rejecting {} notification from {}: {}", notify_on, ip, e);
            AppError::from(e)
        })?;

        let notification = self.provider.parse_notification(body)?;
        info!(
            "Received {} notification for transaction {} from {}",
            notify_on, notification.transaction, ip
        );

        let data = self
            .provider
            .fetch_transaction(&notification.transaction)
            .await?;

        self.notifications
            .add(NewNotification {
                transaction_id: notification.transaction.clone(),
                notify_on,
                time: notification.time.with_timezone(&Utc),
                ip: ip.to_string(),
                status: data.status.clone(),
                status_reason: data.status_reason.clone(),
            })
            .await?;

        let event = NotifyEvent {
            shop_id,
            notify_on,
            transaction: notification.transaction,
            time: notification.time,
            data,
        };

        if !self.events.dispatch_notify(&event).await? {
            warn!(
                "No handler acknowledged {} notification for transaction {}",
                notify_on, event.transaction
            );
            return Err(AppError::unhandled_notification(event.transaction));
        }

        Ok(event)
    }

    /// Shop id recorded when the transaction was opened
    pub async fn shop_id_for_transaction(&self, transaction: &str) -> AppResult<Option<String>> {
        Ok(self
            .shop_transactions
            .find_by_transaction(transaction)
            .await?
            .map(|t| t.shop_id))
    }

    /// Notifications received for a transaction, oldest first
    pub async fn notifications_for(&self, transaction: &str) -> AppResult<Vec<Notification>> {
        Ok(self.notifications.find_by_transaction(transaction).await?)
    }
}

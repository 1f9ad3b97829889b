//! Payment provider types and data structures
//!
//! Provider-neutral types exchanged between the Sofort client, the payment
//! flows, and the host application's event handlers.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status changes a notification URL is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyOn {
    Loss,
    Pending,
    Received,
    Refunded,
}

impl NotifyOn {
    /// Every reason a payment registers a callback for
    pub const ALL: [NotifyOn; 4] = [
        NotifyOn::Loss,
        NotifyOn::Pending,
        NotifyOn::Received,
        NotifyOn::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyOn::Loss => "loss",
            NotifyOn::Pending => "pending",
            NotifyOn::Received => "received",
            NotifyOn::Refunded => "refunded",
        }
    }
}

impl fmt::Display for NotifyOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifyOn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loss" => Ok(NotifyOn::Loss),
            "pending" => Ok(NotifyOn::Pending),
            "received" => Ok(NotifyOn::Received),
            "refunded" => Ok(NotifyOn::Refunded),
            other => Err(format!("unknown notification reason '{}'", other)),
        }
    }
}

/// Payment settings the host application is allowed to choose
///
/// Notification URLs are not part of it: the redirect flow derives them from
/// the shop id and registers them itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Shop or order id forwarded to the notify handler
    #[serde(default)]
    pub shop_id: Option<String>,
    /// Amount in cents
    pub amount: i64,
    /// Currency code (EUR, CHF, ...); falls back to the configured currency
    #[serde(default)]
    pub currency: Option<String>,
    /// Reason lines shown on the buyer's bank statement (at most two)
    #[serde(default)]
    pub reasons: Vec<String>,
    /// Free-form values echoed back in the transaction data
    #[serde(default)]
    pub user_variables: Vec<String>,
    /// Redirect target after a completed payment
    #[serde(default)]
    pub success_url: Option<String>,
    /// Redirect target after the buyer cancels
    #[serde(default)]
    pub abort_url: Option<String>,
    /// Redirect target after the payment page times out
    #[serde(default)]
    pub timeout_url: Option<String>,
}

impl PaymentRequest {
    pub fn new(amount: i64) -> Self {
        Self {
            amount,
            ..Default::default()
        }
    }

    pub fn with_shop_id(mut self, shop_id: impl Into<String>) -> Self {
        self.shop_id = Some(shop_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }
}

/// Callback URL registered with the provider for one status reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationUrl {
    pub notify_on: NotifyOn,
    pub url: String,
}

/// Fully prepared payment sent to the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub amount: i64,
    pub currency: String,
    pub reasons: Vec<String>,
    pub user_variables: Vec<String>,
    pub success_url: Option<String>,
    pub abort_url: Option<String>,
    pub timeout_url: Option<String>,
    pub notification_urls: Vec<NotificationUrl>,
}

/// Payment session opened by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Provider transaction id
    pub transaction: String,
    /// Hosted payment page the buyer is redirected to
    pub payment_url: String,
}

/// Error entry reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub field: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} {} ({})", self.code, self.message, field),
            None => write!(f, "{} {}", self.code, self.message),
        }
    }
}

/// Parsed webhook body; only identifies which transaction changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotification {
    pub transaction: String,
    pub time: DateTime<FixedOffset>,
}

/// Authoritative transaction state as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    pub transaction: String,
    pub project_id: Option<String>,
    pub time: Option<DateTime<FixedOffset>>,
    /// untraceable, pending, received, loss, refunded
    pub status: String,
    pub status_reason: Option<String>,
    pub status_modified: Option<DateTime<FixedOffset>>,
    pub amount: Decimal,
    pub amount_refunded: Decimal,
    pub currency_code: String,
    pub payment_method: Option<String>,
    pub reasons: Vec<String>,
    pub user_variables: Vec<String>,
}

//! Sofort payment provider implementation
//!
//! Talks to the Sofort XML API: `<multipay>` requests open a payment session,
//! `<transaction_request>` fetches the state of a transaction, and inbound
//! `<status_notification>` bodies announce that a transaction changed.

use crate::config::SofortSettings;
use crate::error::{AppError, AppResult};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    PaymentOrder, PaymentSession, ProviderError, StatusNotification, TransactionData,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n";
const INTERFACE_VERSION: &str = concat!("sofort-backend-rs/", env!("CARGO_PKG_VERSION"));

/// Sofort API credentials and transport settings
#[derive(Debug, Clone)]
pub struct SofortConfig {
    pub customer_id: String,
    pub project_id: String,
    pub api_key: String,
    /// Sofort XML API endpoint (defaults to https://api.sofort.com/api/xml)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl SofortConfig {
    /// Split a `customer_id:project_id:api_key` config key
    pub fn from_config_key(config_key: &str, base_url: &str, timeout_secs: u64) -> AppResult<Self> {
        let parts: Vec<&str> = config_key.trim().split(':').collect();
        match parts.as_slice() {
            [customer_id, project_id, api_key]
                if !customer_id.is_empty() && !project_id.is_empty() && !api_key.is_empty() =>
            {
                Ok(Self {
                    customer_id: customer_id.to_string(),
                    project_id: project_id.to_string(),
                    api_key: api_key.to_string(),
                    base_url: base_url.to_string(),
                    timeout_secs,
                })
            }
            _ => Err(AppError::configuration(
                "Sofort config key must have the form customer_id:project_id:api_key",
            )),
        }
    }

    pub fn from_settings(settings: &SofortSettings) -> AppResult<Self> {
        Self::from_config_key(&settings.config_key, &settings.api_url, settings.timeout_secs)
    }
}

/// Sofort payment provider
pub struct SofortProvider {
    config: SofortConfig,
    client: Client,
}

impl SofortProvider {
    pub fn new(config: SofortConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(INTERFACE_VERSION)
            .build()
            .map_err(|e| {
                AppError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            "Sofort provider initialized for project {} at {}",
            config.project_id, config.base_url
        );

        Ok(Self { config, client })
    }

    pub fn from_settings(settings: &SofortSettings) -> AppResult<Self> {
        Self::new(SofortConfig::from_settings(settings)?)
    }

    /// Post an XML document to the Sofort API and return the response body
    async fn post_xml(&self, body: String) -> AppResult<String> {
        debug!("Sending Sofort API request ({} bytes)", body.len());

        let response = self
            .client
            .post(&self.config.base_url)
            .basic_auth(&self.config.customer_id, Some(&self.config.api_key))
            .header("Content-Type", "application/xml; charset=UTF-8")
            .header("Accept", "application/xml; charset=UTF-8")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!("Sofort API request failed: {}", e);
                AppError::from(e)
            })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("Sofort API error: HTTP {}", status);
            // Error documents are returned with non-2xx codes as well
            let errors = parse_error_list(&text);
            return Err(AppError::request(format!("HTTP {}", status), errors));
        }

        Ok(text)
    }

    fn build_multipay_xml(&self, order: &PaymentOrder) -> AppResult<String> {
        let request = MultipayXml {
            project_id: &self.config.project_id,
            interface_version: INTERFACE_VERSION,
            amount: format_amount(order.amount),
            currency_code: &order.currency,
            reasons: ReasonsXml {
                reason: &order.reasons,
            },
            user_variables: (!order.user_variables.is_empty()).then(|| UserVariablesXml {
                user_variable: &order.user_variables,
            }),
            success_url: order.success_url.as_deref(),
            abort_url: order.abort_url.as_deref(),
            timeout_url: order.timeout_url.as_deref(),
            notification_urls: NotificationUrlsXml {
                notification_url: order
                    .notification_urls
                    .iter()
                    .map(|n| NotificationUrlXml {
                        notify_on: n.notify_on.as_str(),
                        url: &n.url,
                    })
                    .collect(),
            },
            su: SuXml {},
        };

        to_xml(&request)
    }

    fn build_transaction_request_xml(&self, transaction: &str) -> AppResult<String> {
        to_xml(&TransactionRequestXml {
            version: "2",
            transaction,
        })
    }
}

#[async_trait]
impl PaymentProvider for SofortProvider {
    async fn create_payment(&self, order: &PaymentOrder) -> AppResult<PaymentSession> {
        info!(
            "Initiating Sofort payment: {} {} with {} notification urls",
            format_amount(order.amount),
            order.currency,
            order.notification_urls.len()
        );

        let body = self.build_multipay_xml(order)?;
        let response = self.post_xml(body).await?;
        let session = parse_multipay_response(&response)?;

        info!(
            "Sofort payment initiated successfully: transaction={}",
            session.transaction
        );
        Ok(session)
    }

    async fn fetch_transaction(&self, transaction: &str) -> AppResult<TransactionData> {
        info!("Fetching Sofort transaction data: transaction={}", transaction);

        let body = self.build_transaction_request_xml(transaction)?;
        let response = self.post_xml(body).await?;
        let data = parse_transaction_response(&response, transaction)?;

        info!(
            "Sofort transaction fetched: transaction={}, status={}, reason={:?}",
            data.transaction, data.status, data.status_reason
        );
        Ok(data)
    }

    fn parse_notification(&self, body: &[u8]) -> AppResult<StatusNotification> {
        parse_status_notification(body)
    }
}

fn to_xml<T: Serialize>(value: &T) -> AppResult<String> {
    let document = quick_xml::se::to_string(value)
        .map_err(|e| AppError::configuration(format!("Failed to serialize request: {}", e)))?;
    Ok(format!("{}{}", XML_DECLARATION, document))
}

/// Cents to the decimal notation Sofort expects (`1051` -> `10.51`)
fn format_amount(cents: i64) -> String {
    Decimal::new(cents, 2).to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).ok()
}

fn parse_amount(value: Option<String>, field: &str) -> AppResult<Decimal> {
    match non_empty(value) {
        Some(raw) => Decimal::from_str(&raw).map_err(|e| {
            AppError::request(format!("Invalid {} '{}' in transaction data: {}", field, raw, e), vec![])
        }),
        None => Ok(Decimal::ZERO),
    }
}

fn into_provider_errors(errors: Vec<ErrorXml>) -> Vec<ProviderError> {
    errors
        .into_iter()
        .map(|e| ProviderError {
            code: e.code.unwrap_or_default(),
            message: e.message.unwrap_or_default(),
            field: non_empty(e.field),
        })
        .collect()
}

fn parse_error_list(xml: &str) -> Vec<ProviderError> {
    quick_xml::de::from_str::<ErrorsXml>(xml)
        .map(|e| into_provider_errors(e.error))
        .unwrap_or_default()
}

pub(crate) fn parse_multipay_response(xml: &str) -> AppResult<PaymentSession> {
    let response: MultipayResponseXml = quick_xml::de::from_str(xml).map_err(|e| {
        error!("Failed to parse Sofort response: {}", e);
        AppError::request(format!("Invalid response format: {}", e), vec![])
    })?;

    let mut errors = response.error;
    if let Some(list) = response.su.and_then(|su| su.errors) {
        errors.extend(list.error);
    }
    if !errors.is_empty() {
        let errors = into_provider_errors(errors);
        error!("Sofort rejected payment: {} error(s)", errors.len());
        return Err(AppError::request("Sofort rejected the payment request", errors));
    }

    match (non_empty(response.transaction), non_empty(response.payment_url)) {
        (Some(transaction), Some(payment_url)) => Ok(PaymentSession {
            transaction,
            payment_url,
        }),
        _ => Err(AppError::request(
            "Sofort response is missing transaction or payment_url",
            vec![],
        )),
    }
}

pub(crate) fn parse_transaction_response(xml: &str, transaction: &str) -> AppResult<TransactionData> {
    let response: TransactionsXml = quick_xml::de::from_str(xml).map_err(|e| {
        error!("Failed to parse Sofort transaction data: {}", e);
        AppError::request(format!("Invalid response format: {}", e), vec![])
    })?;

    if !response.error.is_empty() {
        return Err(AppError::request(
            format!("Sofort rejected transaction request for {}", transaction),
            into_provider_errors(response.error),
        ));
    }

    let details = response
        .transaction_details
        .into_iter()
        .next()
        .ok_or_else(|| {
            AppError::request(
                format!("Sofort returned no data for transaction {}", transaction),
                vec![],
            )
        })?;

    let status = non_empty(details.status).ok_or_else(|| {
        AppError::request(
            format!("Sofort transaction data for {} has no status", transaction),
            vec![],
        )
    })?;

    Ok(TransactionData {
        transaction: non_empty(details.transaction).unwrap_or_else(|| transaction.to_string()),
        project_id: non_empty(details.project_id),
        time: details.time.as_deref().and_then(parse_timestamp),
        status,
        status_reason: non_empty(details.status_reason),
        status_modified: details.status_modified.as_deref().and_then(parse_timestamp),
        amount: parse_amount(details.amount, "amount")?,
        amount_refunded: parse_amount(details.amount_refunded, "amount_refunded")?,
        currency_code: non_empty(details.currency_code).unwrap_or_default(),
        payment_method: non_empty(details.payment_method),
        reasons: details.reasons.map(|r| r.reason).unwrap_or_default(),
        user_variables: details
            .user_variables
            .map(|v| v.user_variable)
            .unwrap_or_default(),
    })
}

pub(crate) fn parse_status_notification(body: &[u8]) -> AppResult<StatusNotification> {
    let text = std::str::from_utf8(body)
        .map_err(|_| AppError::notification("Notification body is not valid UTF-8"))?;
    if text.trim().is_empty() {
        return Err(AppError::notification("Notification body is empty"));
    }

    let notification: StatusNotificationXml = quick_xml::de::from_str(text)
        .map_err(|e| AppError::notification(format!("Unparseable notification: {}", e)))?;

    let transaction = non_empty(Some(notification.transaction))
        .ok_or_else(|| AppError::notification("Notification has no transaction id"))?;
    let time = parse_timestamp(&notification.time).ok_or_else(|| {
        AppError::notification(format!("Invalid notification time '{}'", notification.time))
    })?;

    Ok(StatusNotification { transaction, time })
}

// Multipay request
#[derive(Debug, Serialize)]
#[serde(rename = "multipay")]
struct MultipayXml<'a> {
    project_id: &'a str,
    interface_version: &'a str,
    amount: String,
    currency_code: &'a str,
    reasons: ReasonsXml<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_variables: Option<UserVariablesXml<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    success_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    abort_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_url: Option<&'a str>,
    notification_urls: NotificationUrlsXml<'a>,
    su: SuXml,
}

#[derive(Debug, Serialize)]
struct ReasonsXml<'a> {
    reason: &'a [String],
}

#[derive(Debug, Serialize)]
struct UserVariablesXml<'a> {
    user_variable: &'a [String],
}

#[derive(Debug, Serialize)]
struct NotificationUrlsXml<'a> {
    notification_url: Vec<NotificationUrlXml<'a>>,
}

#[derive(Debug, Serialize)]
struct NotificationUrlXml<'a> {
    #[serde(rename = "@notify_on")]
    notify_on: &'a str,
    #[serde(rename = "$text")]
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct SuXml {}

// Multipay response: <new_transaction> on success, <errors> otherwise
#[derive(Debug, Deserialize)]
struct MultipayResponseXml {
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    payment_url: Option<String>,
    #[serde(default)]
    error: Vec<ErrorXml>,
    #[serde(default)]
    su: Option<SuErrorsXml>,
}

#[derive(Debug, Deserialize)]
struct SuErrorsXml {
    #[serde(default)]
    errors: Option<ErrorsXml>,
}

#[derive(Debug, Deserialize)]
struct ErrorsXml {
    #[serde(default)]
    error: Vec<ErrorXml>,
}

#[derive(Debug, Deserialize)]
struct ErrorXml {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    field: Option<String>,
}

// Transaction request
#[derive(Debug, Serialize)]
#[serde(rename = "transaction_request")]
struct TransactionRequestXml<'a> {
    #[serde(rename = "@version")]
    version: &'a str,
    transaction: &'a str,
}

// Transaction response
#[derive(Debug, Deserialize)]
struct TransactionsXml {
    #[serde(default)]
    transaction_details: Vec<TransactionDetailsXml>,
    #[serde(default)]
    error: Vec<ErrorXml>,
}

#[derive(Debug, Deserialize)]
struct TransactionDetailsXml {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    status_reason: Option<String>,
    #[serde(default)]
    status_modified: Option<String>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    amount_refunded: Option<String>,
    #[serde(default)]
    currency_code: Option<String>,
    #[serde(default)]
    reasons: Option<ReasonsDe>,
    #[serde(default)]
    user_variables: Option<UserVariablesDe>,
}

#[derive(Debug, Deserialize)]
struct ReasonsDe {
    #[serde(default)]
    reason: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UserVariablesDe {
    #[serde(default)]
    user_variable: Vec<String>,
}

// Inbound webhook
#[derive(Debug, Deserialize)]
struct StatusNotificationXml {
    transaction: String,
    time: String,
}

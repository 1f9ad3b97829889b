//! Application error types
//!
//! Every payment flow returns [`AppResult`]. The HTTP layer turns an
//! [`AppError`] into a status code and a JSON body; nothing is retried here,
//! the provider redelivers failed notifications on its own schedule.

use crate::crypto::CodecError;
use crate::database::error::DatabaseError;
use crate::payments::types::ProviderError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppErrorKind {
    /// Missing or malformed configuration (fee conditions, keys, URLs)
    Configuration { message: String },
    /// Operation called before its preconditions were met
    InvalidState { message: String },
    /// The provider rejected a request
    Request {
        message: String,
        errors: Vec<ProviderError>,
    },
    /// Webhook body could not be parsed
    Notification { message: String },
    /// No event handler acknowledged a notification
    UnhandledNotification { transaction: String },
    /// Shop id token in the callback URL could not be decrypted
    ShopId(CodecError),
    Database(DatabaseError),
    /// Transport-level failure talking to an external service
    External { service: String, message: String },
}

#[derive(Debug)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Configuration {
            message: message.into(),
        })
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::InvalidState {
            message: message.into(),
        })
    }

    pub fn request(message: impl Into<String>, errors: Vec<ProviderError>) -> Self {
        Self::new(AppErrorKind::Request {
            message: message.into(),
            errors,
        })
    }

    pub fn notification(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Notification {
            message: message.into(),
        })
    }

    pub fn unhandled_notification(transaction: impl Into<String>) -> Self {
        Self::new(AppErrorKind::UnhandledNotification {
            transaction: transaction.into(),
        })
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::External {
            service: service.into(),
            message: message.into(),
        })
    }

    /// Machine-readable error code used in HTTP responses
    pub fn code(&self) -> &'static str {
        match &self.kind {
            AppErrorKind::Configuration { .. } => "CONFIGURATION_ERROR",
            AppErrorKind::InvalidState { .. } => "INVALID_STATE",
            AppErrorKind::Request { .. } => "REQUEST_ERROR",
            AppErrorKind::Notification { .. } => "NOTIFICATION_ERROR",
            AppErrorKind::UnhandledNotification { .. } => "UNHANDLED_NOTIFICATION",
            AppErrorKind::ShopId(_) => "INVALID_SHOP_ID",
            AppErrorKind::Database(err) if err.is_not_found() => "NOT_FOUND",
            AppErrorKind::Database(_) => "DATABASE_ERROR",
            AppErrorKind::External { .. } => "EXTERNAL_SERVICE_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Notification { .. } | AppErrorKind::ShopId(_) => StatusCode::BAD_REQUEST,
            AppErrorKind::Database(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            AppErrorKind::Request { .. } | AppErrorKind::External { .. } => StatusCode::BAD_GATEWAY,
            AppErrorKind::Configuration { .. }
            | AppErrorKind::InvalidState { .. }
            | AppErrorKind::UnhandledNotification { .. }
            | AppErrorKind::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, AppErrorKind::Configuration { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self.kind, AppErrorKind::InvalidState { .. })
    }

    pub fn is_request(&self) -> bool {
        matches!(self.kind, AppErrorKind::Request { .. })
    }

    pub fn is_notification(&self) -> bool {
        matches!(self.kind, AppErrorKind::Notification { .. })
    }

    pub fn is_unhandled_notification(&self) -> bool {
        matches!(self.kind, AppErrorKind::UnhandledNotification { .. })
    }

    /// Provider error payload, if the provider rejected the request
    pub fn provider_errors(&self) -> &[ProviderError] {
        match &self.kind {
            AppErrorKind::Request { errors, .. } => errors,
            _ => &[],
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            AppErrorKind::Configuration { message } => format!("Configuration error: {}", message),
            AppErrorKind::InvalidState { message } => format!("Invalid state: {}", message),
            AppErrorKind::Request { message, errors } => {
                if errors.is_empty() {
                    format!("Payment provider request failed: {}", message)
                } else {
                    let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                    format!(
                        "Payment provider request failed: {} [{}]",
                        message,
                        details.join("; ")
                    )
                }
            }
            AppErrorKind::Notification { message } => {
                format!("Invalid payment notification: {}", message)
            }
            AppErrorKind::UnhandledNotification { transaction } => {
                format!("Payment notification is unhandled (transaction {})", transaction)
            }
            AppErrorKind::ShopId(err) => format!("Invalid shop id: {}", err),
            AppErrorKind::Database(err) => err.to_string(),
            AppErrorKind::External { service, message } => {
                format!("{} is unavailable: {}", service, message)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AppErrorKind::ShopId(err) => Some(err),
            AppErrorKind::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        Self::new(AppErrorKind::Database(err))
    }
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        Self::new(AppErrorKind::ShopId(err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        Self::external("Sofort API", message)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ProviderError>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), "{}", self);
        } else {
            warn!(code = self.code(), "{}", self);
        }

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            errors: self.provider_errors().to_vec(),
        };
        (status, Json(body)).into_response()
    }
}

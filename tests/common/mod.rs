#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Response;
use axum::Router;
use rust_decimal::Decimal;
use sofort_backend::api::{build_router, AppState};
use sofort_backend::config::SofortSettings;
use sofort_backend::crypto::ShopIdCodec;
use sofort_backend::database::memory::{InMemoryNotificationStore, InMemoryShopTransactionStore};
use sofort_backend::error::{AppError, AppResult};
use sofort_backend::events::{EventDispatcher, NewTransactionEvent, NotifyEvent, PaymentEventHandler};
use sofort_backend::payments::fees::FeeConditions;
use sofort_backend::payments::providers::{SofortConfig, SofortProvider};
use sofort_backend::payments::service::SofortService;
use sofort_backend::payments::traits::PaymentProvider;
use sofort_backend::payments::types::{
    PaymentOrder, PaymentSession, ProviderError, StatusNotification, TransactionData,
};
use std::sync::{Arc, Mutex};

pub const ENCRYPTION_KEY: &str = "integration-secret";
pub const TRANSACTION: &str = "29117-191357-5F3D6B3C-A3B1";
pub const PAYMENT_URL: &str = "https://www.sofort.com/payment/go/5f3d6b3ca3b1";

pub fn settings() -> SofortSettings {
    SofortSettings {
        config_key: "29117:191357:0a1b2c3d4e5f".to_string(),
        encryption_key: ENCRYPTION_KEY.to_string(),
        currency: "EUR".to_string(),
        api_url: "https://api.sofort.com/api/xml".to_string(),
        notify_url: "https://shop.example.com/sofort/notify".to_string(),
        timeout_secs: 5,
        conditions: Some(FeeConditions::new(Decimal::new(35, 0), Decimal::new(15, 3))),
    }
}

pub fn notification_body(transaction: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <status_notification>\
         <transaction>{}</transaction>\
         <time>2024-03-14T19:01:08+01:00</time>\
         </status_notification>",
        transaction
    )
}

/// Provider double: records orders, answers with canned data and parses
/// webhook bodies with the real Sofort parser
pub struct MockProvider {
    pub orders: Mutex<Vec<PaymentOrder>>,
    pub fetched: Mutex<Vec<String>>,
    rejection: Option<Vec<ProviderError>>,
    status: String,
    parser: SofortProvider,
}

impl MockProvider {
    pub fn new() -> Self {
        let config = SofortConfig::from_config_key("1:2:key", "http://127.0.0.1:9", 1).unwrap();
        Self {
            orders: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
            rejection: None,
            status: "received".to_string(),
            parser: SofortProvider::new(config).unwrap(),
        }
    }

    pub fn rejecting(errors: Vec<ProviderError>) -> Self {
        Self {
            rejection: Some(errors),
            ..Self::new()
        }
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_payment(&self, order: &PaymentOrder) -> AppResult<PaymentSession> {
        self.orders.lock().unwrap().push(order.clone());
        if let Some(errors) = &self.rejection {
            return Err(AppError::request(
                "Sofort rejected the payment request",
                errors.clone(),
            ));
        }
        Ok(PaymentSession {
            transaction: TRANSACTION.to_string(),
            payment_url: PAYMENT_URL.to_string(),
        })
    }

    async fn fetch_transaction(&self, transaction: &str) -> AppResult<TransactionData> {
        self.fetched.lock().unwrap().push(transaction.to_string());
        Ok(TransactionData {
            transaction: transaction.to_string(),
            project_id: Some("191357".to_string()),
            time: None,
            status: self.status.clone(),
            status_reason: Some("credited".to_string()),
            status_modified: None,
            amount: Decimal::new(1051, 2),
            amount_refunded: Decimal::ZERO,
            currency_code: "EUR".to_string(),
            payment_method: Some("su".to_string()),
            reasons: vec!["Order 7".to_string()],
            user_variables: vec![],
        })
    }

    fn parse_notification(&self, body: &[u8]) -> AppResult<StatusNotification> {
        self.parser.parse_notification(body)
    }
}

/// Records every event and answers notifications with a fixed acknowledgment
pub struct RecordingHandler {
    acknowledge: bool,
    pub opened: Mutex<Vec<NewTransactionEvent>>,
    pub notified: Mutex<Vec<NotifyEvent>>,
}

impl RecordingHandler {
    pub fn new(acknowledge: bool) -> Arc<Self> {
        Arc::new(Self {
            acknowledge,
            opened: Mutex::new(Vec::new()),
            notified: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PaymentEventHandler for RecordingHandler {
    async fn on_new_transaction(&self, event: &NewTransactionEvent) -> AppResult<()> {
        self.opened.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn on_notify(&self, event: &NotifyEvent) -> AppResult<bool> {
        self.notified.lock().unwrap().push(event.clone());
        Ok(self.acknowledge)
    }
}

pub struct TestApp {
    pub router: Router,
    pub provider: Arc<MockProvider>,
    pub handler: Arc<RecordingHandler>,
    pub shop_transactions: InMemoryShopTransactionStore,
    pub notifications: InMemoryNotificationStore,
    pub codec: ShopIdCodec,
}

/// App behind a trusted proxy, on in-memory stores
pub fn spawn_app(provider: MockProvider, acknowledge: bool) -> TestApp {
    spawn_app_with(provider, acknowledge, |state| state.with_trust_proxy(true))
}

pub fn spawn_app_with<F>(provider: MockProvider, acknowledge: bool, configure: F) -> TestApp
where
    F: FnOnce(AppState) -> AppState,
{
    let provider = Arc::new(provider);
    let handler = RecordingHandler::new(acknowledge);
    let shop_transactions = InMemoryShopTransactionStore::new();
    let notifications = InMemoryNotificationStore::new();

    let service = SofortService::new(
        &settings(),
        provider.clone(),
        Arc::new(shop_transactions.clone()),
        Arc::new(notifications.clone()),
        EventDispatcher::new().with_handler(handler.clone()),
    )
    .unwrap();

    TestApp {
        router: build_router(configure(AppState::new(service, "test"))),
        provider,
        handler,
        shop_transactions,
        notifications,
        codec: ShopIdCodec::new(ENCRYPTION_KEY).unwrap(),
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub mod health;
pub mod notify;
pub mod payments;

use crate::payments::service::SofortService;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SofortService>,
    pub environment: String,
    /// Honour `X-Forwarded-For` when recording the notifying address
    pub trust_proxy: bool,
    /// Pool probed by `/health`; absent when running on in-memory stores
    pub database: Option<PgPool>,
}

impl AppState {
    pub fn new(service: SofortService, environment: impl Into<String>) -> Self {
        Self {
            service: Arc::new(service),
            environment: environment.into(),
            trust_proxy: false,
            database: None,
        }
    }

    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.database = Some(pool);
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/sofort/notify", post(notify::notify))
        .route("/sofort/payments", post(payments::create_payment))
        .route("/sofort/transactions/:transaction", get(payments::get_transaction))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

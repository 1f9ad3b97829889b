use async_trait::async_trait;
use sofort_backend::api::{build_router, AppState};
use sofort_backend::config::Config;
use sofort_backend::database::notification_repository::NotificationRepository;
use sofort_backend::database::shop_transaction_repository::ShopTransactionRepository;
use sofort_backend::database::{init_pool, run_migrations, PoolConfig};
use sofort_backend::error::AppResult;
use sofort_backend::events::{EventDispatcher, NewTransactionEvent, NotifyEvent, PaymentEventHandler};
use sofort_backend::payments::providers::SofortProvider;
use sofort_backend::payments::service::SofortService;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Acknowledges every notification after logging it
struct LoggingHandler;

#[async_trait]
impl PaymentEventHandler for LoggingHandler {
    async fn on_new_transaction(&self, event: &NewTransactionEvent) -> AppResult<()> {
        tracing::info!(
            transaction = %event.transaction,
            "Buyer redirected to {}", event.payment_url
        );
        Ok(())
    }

    async fn on_notify(&self, event: &NotifyEvent) -> AppResult<bool> {
        tracing::info!(
            shop_id = %event.shop_id,
            transaction = %event.transaction,
            notify_on = %event.notify_on,
            status = %event.data.status,
            "Payment status changed"
        );
        Ok(true)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting Sofort backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Notify URL: {}", config.sofort.notify_url);
    if config.sofort.conditions.is_none() {
        tracing::warn!("Sofort fee conditions are not configured");
    }

    let pool = init_pool(
        &config.database.url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..Default::default()
        }),
    )
    .await?;
    run_migrations(&pool).await?;

    let provider = SofortProvider::from_settings(&config.sofort)?;
    let events = EventDispatcher::new().with_handler(Arc::new(LoggingHandler));
    let service = SofortService::new(
        &config.sofort,
        Arc::new(provider),
        Arc::new(ShopTransactionRepository::new(pool.clone())),
        Arc::new(NotificationRepository::new(pool.clone())),
        events,
    )?;

    let state = AppState::new(service, config.server.environment.clone())
        .with_trust_proxy(config.server.trust_proxy)
        .with_database(pool);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

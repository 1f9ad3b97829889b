use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::database;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub fee_conditions_configured: bool,
    /// `None` when no database is attached
    pub database_reachable: Option<bool>,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let fee_conditions_configured = state
        .service
        .conditions()
        .map(|c| c.is_complete())
        .unwrap_or(false);

    let database_reachable = match &state.database {
        Some(pool) => Some(database::health_check(pool).await.is_ok()),
        None => None,
    };
    let healthy = database_reachable.unwrap_or(true);

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version,
        environment: state.environment.clone(),
        fee_conditions_configured,
        database_reachable,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

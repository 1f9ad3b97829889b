//! Sofort notification endpoint
//!
//! Sofort calls `POST /sofort/notify?eShopId=..&notifyOn=..` with a
//! `<status_notification>` body. A 200 with an empty body tells Sofort the
//! notification arrived; any error status makes it try again later.

use crate::api::AppState;
use crate::error::AppResult;
use crate::payments::types::NotifyOn;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct NotifyParams {
    /// Encrypted shop id
    #[serde(rename = "eShopId")]
    pub e_shop_id: String,
    #[serde(rename = "notifyOn")]
    pub notify_on: NotifyOn,
}

pub async fn notify(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<NotifyParams>,
    body: Bytes,
) -> AppResult<StatusCode> {
    let ip = client_ip(
        &headers,
        connect_info.map(|ConnectInfo(addr)| addr),
        state.trust_proxy,
    );

    state
        .service
        .handle_notify(&params.e_shop_id, params.notify_on, &ip, &body)
        .await?;

    Ok(StatusCode::OK)
}

/// Peer address, or the first `X-Forwarded-For` entry when a proxy is trusted
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = if trust_proxy {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers
    }

    #[test]
    fn test_client_ip_uses_forwarded_header_behind_proxy() {
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        assert_eq!(client_ip(&forwarded_headers(), Some(peer), true), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_ignores_forwarded_header_by_default() {
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        assert_eq!(client_ip(&forwarded_headers(), Some(peer), false), "10.0.0.1");
        assert_eq!(client_ip(&forwarded_headers(), None, false), "unknown");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let peer: SocketAddr = "192.0.2.4:4000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), "192.0.2.4");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), "unknown");
    }
}

//! Notify endpoint driven through the router with a mock provider

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{
    body_bytes, body_json, notification_body, spawn_app, spawn_app_with, MockProvider, TRANSACTION,
};
use sofort_backend::payments::types::NotifyOn;
use tower::ServiceExt;

fn notify_request(query: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/sofort/notify?{}", query))
        .header("content-type", "application/xml")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_handled_notification_returns_empty_ok() {
    let app = spawn_app(MockProvider::new(), true);
    let token = app.codec.encrypt("order-7").unwrap();

    let response = app
        .router
        .clone()
        .oneshot(notify_request(
            &format!("eShopId={}&notifyOn=received", token),
            notification_body(TRANSACTION),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());

    // Status is always fetched, never taken from the webhook
    assert_eq!(*app.provider.fetched.lock().unwrap(), vec![TRANSACTION.to_string()]);

    let stored = app.notifications.all().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].transaction_id, TRANSACTION);
    assert_eq!(stored[0].notify_on, "received");
    assert_eq!(stored[0].ip, "203.0.113.9");
    assert_eq!(stored[0].status, "received");
    assert_eq!(stored[0].status_reason.as_deref(), Some("credited"));

    let events = app.handler.notified.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].shop_id, "order-7");
    assert_eq!(events[0].notify_on, NotifyOn::Received);
    assert_eq!(events[0].transaction, TRANSACTION);
    assert_eq!(events[0].time.to_rfc3339(), "2024-03-14T19:01:08+01:00");
}

#[tokio::test]
async fn test_unhandled_notification_is_a_server_error() {
    let app = spawn_app(MockProvider::new(), false);
    let transactions = [TRANSACTION, "1-2-3", "99999-123456-ABCDEF01-FFFF"];
    let mut sent = 0;

    for shop_id in ["order-7", "42"] {
        let token = app.codec.encrypt(shop_id).unwrap();
        for notify_on in NotifyOn::ALL {
            for transaction in transactions {
                let response = app
                    .router
                    .clone()
                    .oneshot(notify_request(
                        &format!("eShopId={}&notifyOn={}", token, notify_on),
                        notification_body(transaction),
                    ))
                    .await
                    .unwrap();
                sent += 1;

                assert_eq!(
                    response.status(),
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "{} notification for {}",
                    notify_on,
                    transaction
                );
                assert_eq!(body_json(response).await["code"], "UNHANDLED_NOTIFICATION");
            }
        }
    }

    // Recorded even though nobody acknowledged them
    assert_eq!(app.notifications.all().await.len(), sent);
    assert_eq!(app.handler.notified.lock().unwrap().len(), sent);
}

#[tokio::test]
async fn test_forwarded_address_ignored_without_trusted_proxy() {
    let app = spawn_app_with(MockProvider::new(), true, |state| state);
    let token = app.codec.encrypt("order-7").unwrap();

    let response = app
        .router
        .clone()
        .oneshot(notify_request(
            &format!("eShopId={}&notifyOn=received", token),
            notification_body(TRANSACTION),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // No peer address without a socket; the spoofable header is not used
    let stored = app.notifications.all().await;
    assert_eq!(stored[0].ip, "unknown");
}

#[tokio::test]
async fn test_undecryptable_shop_id_is_rejected() {
    let app = spawn_app(MockProvider::new(), true);

    let response = app
        .router
        .clone()
        .oneshot(notify_request(
            "eShopId=bm90LWEtdG9rZW4&notifyOn=received",
            notification_body(TRANSACTION),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_SHOP_ID");
    assert!(app.provider.fetched.lock().unwrap().is_empty());
    assert!(app.notifications.all().await.is_empty());
}

#[tokio::test]
async fn test_unparseable_body_is_rejected() {
    let app = spawn_app(MockProvider::new(), true);
    let token = app.codec.encrypt("order-7").unwrap();

    for body in ["", "not xml at all", "<status_notification><time>yesterday</time></status_notification>"] {
        let response = app
            .router
            .clone()
            .oneshot(notify_request(
                &format!("eShopId={}&notifyOn=loss", token),
                body.to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {:?}", body);
        assert_eq!(body_json(response).await["code"], "NOTIFICATION_ERROR");
    }
    assert!(app.handler.notified.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_query_parameters_are_rejected() {
    let app = spawn_app(MockProvider::new(), true);
    let token = app.codec.encrypt("order-7").unwrap();

    for query in [
        format!("eShopId={}&notifyOn=chargeback", token),
        format!("eShopId={}", token),
        "notifyOn=received".to_string(),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(notify_request(&query, notification_body(TRANSACTION)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "query: {}", query);
    }
    assert!(app.notifications.all().await.is_empty());
}

//! RestPaymentProvider against a mocked provider API.

use bigdecimal::BigDecimal;
use std::str::FromStr;

use credits_core::provider::{PaymentProvider, ProviderError, RestPaymentProvider};

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

#[tokio::test]
async fn create_order_parses_provider_response() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/orders")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"order_id":"ord-1","approve_url":"https://pay.example.test/approve/ord-1"}"#,
        )
        .create_async()
        .await;

    let client = RestPaymentProvider::new(server.url(), "sk-test".to_string());
    let order = client.create_order(&dec("50.00"), "USD").await.unwrap();
    assert_eq!(order.order_id, "ord-1");
    assert!(order.approve_url.ends_with("/approve/ord-1"));
}

#[tokio::test]
async fn capture_order_parses_amount_as_decimal() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/orders/ord-1/capture")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"order_id":"ord-1","status":"completed","amount":"100.00","currency":"USD"}"#,
        )
        .create_async()
        .await;

    let client = RestPaymentProvider::new(server.url(), "sk-test".to_string());
    let capture = client.capture_order("ord-1").await.unwrap();
    assert!(capture.is_completed());
    assert_eq!(capture.amount, dec("100.00"));
}

#[tokio::test]
async fn server_error_maps_to_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/orders")
        .with_status(502)
        .create_async()
        .await;

    let client = RestPaymentProvider::new(server.url(), "sk-test".to_string());
    let err = client.create_order(&dec("50.00"), "USD").await.unwrap_err();
    assert!(matches!(err, ProviderError::Rejected(502)));
}

#[tokio::test]
async fn breaker_opens_after_consecutive_failures() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/orders")
        .with_status(500)
        .expect_at_least(3)
        .create_async()
        .await;

    let client =
        RestPaymentProvider::with_circuit_breaker(server.url(), "sk-test".to_string(), 3, 60);

    for _ in 0..3 {
        let _ = client.create_order(&dec("50.00"), "USD").await;
    }

    let err = client.create_order(&dec("50.00"), "USD").await.unwrap_err();
    assert!(matches!(err, ProviderError::CircuitOpen));
    assert_eq!(client.circuit_state(), "open");
}

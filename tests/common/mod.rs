//! Shared harness: an app wired to the in-memory ledger and a scriptable
//! in-process payment provider.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bigdecimal::BigDecimal;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use credits_core::config::{Config, LedgerBackend};
use credits_core::adapters::MemoryLedgerStore;
use credits_core::provider::{PaymentProvider, ProviderCapture, ProviderError, ProviderOrder};
use credits_core::{create_app, AppState};

pub const WEBHOOK_SECRET: &str = "whsec-test";
pub const ADMIN_KEY: &str = "admin-test-key";

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

#[derive(Default)]
pub struct FakeProvider {
    pub fail_create: bool,
    counter: AtomicU32,
    orders: Mutex<HashMap<String, ProviderCapture>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    /// Override what a later capture reports for an order.
    pub async fn script_capture(&self, order_id: &str, status: &str, amount: &str) {
        let mut orders = self.orders.lock().await;
        orders.insert(
            order_id.to_string(),
            ProviderCapture {
                order_id: order_id.to_string(),
                status: status.to_string(),
                amount: dec(amount),
                currency: "USD".to_string(),
            },
        );
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_order(
        &self,
        amount: &BigDecimal,
        currency: &str,
    ) -> Result<ProviderOrder, ProviderError> {
        if self.fail_create {
            return Err(ProviderError::Rejected(503));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let order_id = format!("ord-{}", n);
        self.orders.lock().await.insert(
            order_id.clone(),
            ProviderCapture {
                order_id: order_id.clone(),
                status: "completed".to_string(),
                amount: amount.clone(),
                currency: currency.to_string(),
            },
        );
        Ok(ProviderOrder {
            approve_url: format!("https://pay.example.test/approve/{}", order_id),
            order_id,
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<ProviderCapture, ProviderError> {
        self.orders
            .lock()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("unknown order {}", order_id)))
    }
}

pub fn test_config() -> Config {
    Config {
        server_port: 0,
        ledger_backend: LedgerBackend::Memory,
        database_url: None,
        provider_api_url: "https://pay.example.test".to_string(),
        provider_api_key: "sk-test".to_string(),
        provider_webhook_secret: WEBHOOK_SECRET.to_string(),
        admin_api_key: ADMIN_KEY.to_string(),
        min_topup_amount: dec("5.00"),
        validate_on_startup: false,
    }
}

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryLedgerStore>,
    pub provider: Arc<FakeProvider>,
}

pub fn test_app_with_provider(provider: FakeProvider) -> TestApp {
    let store = Arc::new(MemoryLedgerStore::new());
    let provider = Arc::new(provider);
    let state = AppState::new(
        Arc::new(test_config()),
        store.clone(),
        store.clone(),
        provider.clone(),
    );
    TestApp {
        app: create_app(state),
        store,
        provider,
    }
}

pub fn test_app() -> TestApp {
    test_app_with_provider(FakeProvider::new())
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn signed_webhook(uri: &str, payload: &Value) -> Request<Body> {
    let body = payload.to_string();
    let signature = credits_core::handlers::auth::sign(WEBHOOK_SECRET, body.as_bytes());
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Webhook-Signature", signature)
        .body(Body::from(body))
        .unwrap()
}

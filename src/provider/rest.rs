use async_trait::async_trait;
use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::{PaymentProvider, ProviderCapture, ProviderError, ProviderOrder};

/// HTTP client for the payment provider's order API.
///
/// Transport failures and 5xx responses trip a circuit breaker so a degraded
/// provider fails fast instead of tying up request handlers.
#[derive(Clone)]
pub struct RestPaymentProvider {
    client: Client,
    base_url: String,
    api_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl RestPaymentProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self::with_circuit_breaker(base_url, api_key, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        api_key: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            base_url,
            api_key,
            circuit_breaker,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current circuit breaker state, for health reporting.
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PaymentProvider for RestPaymentProvider {
    async fn create_order(
        &self,
        amount: &BigDecimal,
        currency: &str,
    ) -> Result<ProviderOrder, ProviderError> {
        let url = self.endpoint("/v1/orders");
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let body = json!({
            "amount": amount.to_string(),
            "currency": currency,
        });

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .bearer_auth(&api_key)
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ProviderError::Rejected(status.as_u16()));
                }

                let order = response
                    .json::<ProviderOrder>()
                    .await
                    .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                Ok(order)
            })
            .await;

        match result {
            Ok(order) => Ok(order),
            Err(FailsafeError::Rejected) => Err(ProviderError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn capture_order(&self, order_id: &str) -> Result<ProviderCapture, ProviderError> {
        let url = self.endpoint(&format!("/v1/orders/{}/capture", order_id));
        let client = self.client.clone();
        let api_key = self.api_key.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).bearer_auth(&api_key).send().await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ProviderError::Rejected(status.as_u16()));
                }

                let capture = response
                    .json::<ProviderCapture>()
                    .await
                    .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                Ok(capture)
            })
            .await;

        match result {
            Ok(capture) => Ok(capture),
            Err(FailsafeError::Rejected) => Err(ProviderError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

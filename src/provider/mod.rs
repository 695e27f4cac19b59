//! Outbound payment-provider interface.

pub mod rest;

pub use rest::RestPaymentProvider;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider rejected the request with status {0}")]
    Rejected(u16),
    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),
    #[error("provider circuit breaker is open")]
    CircuitOpen,
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::ProviderUnavailable(err.to_string())
    }
}

/// Order created at the provider; the user approves it at `approve_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub order_id: String,
    pub approve_url: String,
}

/// Result of capturing an order. The provider's word on amount and status is
/// the authority; redirect-return query parameters are never trusted over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapture {
    pub order_id: String,
    pub status: String,
    pub amount: BigDecimal,
    pub currency: String,
}

impl ProviderCapture {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// Client for the external payment provider's order API.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create an order the user will be redirected to approve.
    async fn create_order(
        &self,
        amount: &BigDecimal,
        currency: &str,
    ) -> Result<ProviderOrder, ProviderError>;

    /// Capture an approved order, confirming its final amount and status.
    async fn capture_order(&self, order_id: &str) -> Result<ProviderCapture, ProviderError>;
}

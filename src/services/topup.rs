//! Top-up coordination: bridges a payment-provider confirmation to the ledger
//! with at most one credit per external payment.
//!
//! Confirmations can arrive through the provider webhook, through the user's
//! redirect return, or both; every path converges on the same idempotent
//! settle keyed by the provider's order id. Whichever arrives first wins and
//! the rest are no-ops.

use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    amount, LedgerTransaction, NewTransaction, SettleOutcome, TransactionKind, TransactionStatus,
};
use crate::error::AppError;
use crate::ports::LedgerStore;
use crate::provider::PaymentProvider;

/// Result of initiating a top-up; the caller redirects the user to
/// `redirect_url` and the ledger holds a pending entry under `provider_ref`.
#[derive(Debug, Clone, Serialize)]
pub struct TopUpInitiated {
    pub ledger_ref: Uuid,
    pub provider_ref: String,
    pub redirect_url: String,
}

pub struct TopUpCoordinator {
    store: Arc<dyn LedgerStore>,
    provider: Arc<dyn PaymentProvider>,
    minimum_topup: BigDecimal,
}

impl TopUpCoordinator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn PaymentProvider>,
        minimum_topup: BigDecimal,
    ) -> Self {
        Self {
            store,
            provider,
            minimum_topup,
        }
    }

    /// Open a top-up: create the provider order first, then the pending
    /// ledger entry keyed by the order id. A provider failure therefore
    /// leaves no orphaned pending entry behind.
    pub async fn initiate_top_up(
        &self,
        account_id: &str,
        requested: &BigDecimal,
        currency: &str,
    ) -> Result<TopUpInitiated, AppError> {
        let amount = amount::validate(requested)?;
        if amount < self.minimum_topup {
            return Err(AppError::InvalidAmount(format!(
                "top-up amount {} is below the provider minimum {}",
                amount, self.minimum_topup
            )));
        }

        let order = self.provider.create_order(&amount, currency).await?;

        let tx = self
            .store
            .append_transaction(NewTransaction {
                account_id: account_id.to_string(),
                kind: TransactionKind::TopUp,
                amount,
                external_ref: Some(order.order_id.clone()),
                metadata: Some(json!({ "currency": currency })),
            })
            .await?;

        tracing::info!(
            account_id,
            provider_ref = %order.order_id,
            ledger_ref = %tx.id,
            "top-up initiated"
        );

        Ok(TopUpInitiated {
            ledger_ref: tx.id,
            provider_ref: order.order_id,
            redirect_url: order.approve_url,
        })
    }

    /// Apply a verified provider confirmation to the ledger.
    ///
    /// The caller must already have authenticated the confirmation (webhook
    /// signature, or a direct capture call against the provider). A repeated
    /// confirmation for an already-completed transaction with the same amount
    /// is a no-op success; a confirmed amount that differs from the recorded
    /// one settles the transaction `failed` and is never applied.
    pub async fn confirm_top_up(
        &self,
        provider_ref: &str,
        verified_amount: &BigDecimal,
    ) -> Result<LedgerTransaction, AppError> {
        let confirmed = amount::validate(verified_amount)?;

        let tx = self
            .store
            .find_by_external_ref(provider_ref)
            .await?
            .ok_or_else(|| AppError::UnknownReference(provider_ref.to_string()))?;

        match tx.status {
            TransactionStatus::Completed => {
                if tx.amount == confirmed {
                    // Duplicate delivery; already credited exactly once.
                    return Ok(tx);
                }
                Err(AppError::AmountMismatch {
                    recorded: tx.amount,
                    confirmed,
                })
            }
            TransactionStatus::Failed => Err(AppError::InvalidStateTransition(format!(
                "top-up {} already settled failed",
                provider_ref
            ))),
            TransactionStatus::Pending => {
                if tx.amount != confirmed {
                    tracing::warn!(
                        provider_ref,
                        recorded = %tx.amount,
                        confirmed = %confirmed,
                        "confirmation amount mismatch, settling failed"
                    );
                    self.store
                        .settle_pending(tx.id, SettleOutcome::Failed)
                        .await?;
                    return Err(AppError::AmountMismatch {
                        recorded: tx.amount,
                        confirmed,
                    });
                }
                let settled = self
                    .store
                    .settle_pending(tx.id, SettleOutcome::Completed)
                    .await?;
                tracing::info!(provider_ref, ledger_ref = %settled.id, "top-up completed");
                Ok(settled)
            }
        }
    }

    /// Redirect-return finalizer. Query parameters are untrusted; the
    /// provider's capture response is the authority on amount and outcome.
    pub async fn finalize_return(&self, provider_ref: &str) -> Result<LedgerTransaction, AppError> {
        let capture = self.provider.capture_order(provider_ref).await?;

        if capture.is_completed() {
            return self.confirm_top_up(provider_ref, &capture.amount).await;
        }

        let tx = self
            .store
            .find_by_external_ref(provider_ref)
            .await?
            .ok_or_else(|| AppError::UnknownReference(provider_ref.to_string()))?;

        if tx.status == TransactionStatus::Pending {
            tracing::warn!(
                provider_ref,
                capture_status = %capture.status,
                "provider declined capture, settling failed"
            );
            return self.store.settle_pending(tx.id, SettleOutcome::Failed).await;
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryLedgerStore;
    use crate::provider::{ProviderCapture, ProviderError, ProviderOrder};
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    struct StubProvider {
        fail_create: bool,
        capture_status: String,
        capture_amount: Option<BigDecimal>,
        orders: AtomicU32,
    }

    impl StubProvider {
        fn healthy() -> Self {
            Self {
                fail_create: false,
                capture_status: "completed".to_string(),
                capture_amount: None,
                orders: AtomicU32::new(0),
            }
        }

        fn unreachable() -> Self {
            Self {
                fail_create: true,
                ..Self::healthy()
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for StubProvider {
        async fn create_order(
            &self,
            _amount: &BigDecimal,
            _currency: &str,
        ) -> Result<ProviderOrder, ProviderError> {
            if self.fail_create {
                return Err(ProviderError::Rejected(502));
            }
            let n = self.orders.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderOrder {
                order_id: format!("ord-{}", n),
                approve_url: format!("https://pay.example.test/approve/ord-{}", n),
            })
        }

        async fn capture_order(&self, order_id: &str) -> Result<ProviderCapture, ProviderError> {
            Ok(ProviderCapture {
                order_id: order_id.to_string(),
                status: self.capture_status.clone(),
                amount: self.capture_amount.clone().unwrap_or_else(|| dec("100.00")),
                currency: "USD".to_string(),
            })
        }
    }

    fn coordinator(provider: StubProvider) -> (Arc<MemoryLedgerStore>, TopUpCoordinator) {
        let store = Arc::new(MemoryLedgerStore::new());
        let coordinator = TopUpCoordinator::new(
            store.clone(),
            Arc::new(provider),
            dec("5.00"),
        );
        (store, coordinator)
    }

    #[tokio::test]
    async fn initiate_then_confirm_credits_exactly_once() {
        let (store, coordinator) = coordinator(StubProvider::healthy());

        let initiated = coordinator
            .initiate_top_up("acct-1", &dec("100.00"), "USD")
            .await
            .unwrap();
        assert_eq!(store.get_balance("acct-1").await.unwrap().balance, dec("0.00"));

        coordinator
            .confirm_top_up(&initiated.provider_ref, &dec("100.00"))
            .await
            .unwrap();
        assert_eq!(
            store.get_balance("acct-1").await.unwrap().balance,
            dec("100.00")
        );

        // Duplicate webhook delivery is a no-op.
        coordinator
            .confirm_top_up(&initiated.provider_ref, &dec("100.00"))
            .await
            .unwrap();
        assert_eq!(
            store.get_balance("acct-1").await.unwrap().balance,
            dec("100.00")
        );
    }

    #[tokio::test]
    async fn below_minimum_is_rejected_before_the_provider_is_called() {
        let (_, coordinator) = coordinator(StubProvider::unreachable());
        let err = coordinator
            .initiate_top_up("acct-1", &dec("1.00"), "USD")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn provider_failure_leaves_no_pending_entry() {
        let (store, coordinator) = coordinator(StubProvider::unreachable());
        let err = coordinator
            .initiate_top_up("acct-1", &dec("50.00"), "USD")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProviderUnavailable(_)));

        let pending = store
            .list_aged_pending(chrono::Duration::seconds(0))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn amount_mismatch_settles_failed_and_never_credits() {
        let (store, coordinator) = coordinator(StubProvider::healthy());
        let initiated = coordinator
            .initiate_top_up("acct-1", &dec("100.00"), "USD")
            .await
            .unwrap();

        let err = coordinator
            .confirm_top_up(&initiated.provider_ref, &dec("90.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AmountMismatch { .. }));
        assert_eq!(store.get_balance("acct-1").await.unwrap().balance, dec("0.00"));

        let tx = store.get_transaction(initiated.ledger_ref).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn unknown_reference_is_surfaced() {
        let (_, coordinator) = coordinator(StubProvider::healthy());
        let err = coordinator
            .confirm_top_up("ord-unknown", &dec("10.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownReference(_)));
    }

    #[tokio::test]
    async fn declined_capture_settles_failed_on_return_path() {
        let (store, coordinator) = coordinator(StubProvider {
            capture_status: "declined".to_string(),
            ..StubProvider::healthy()
        });
        let initiated = coordinator
            .initiate_top_up("acct-1", &dec("100.00"), "USD")
            .await
            .unwrap();

        let tx = coordinator
            .finalize_return(&initiated.provider_ref)
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(store.get_balance("acct-1").await.unwrap().balance, dec("0.00"));
    }

    #[tokio::test]
    async fn return_path_after_webhook_is_noop() {
        let (store, coordinator) = coordinator(StubProvider::healthy());
        let initiated = coordinator
            .initiate_top_up("acct-1", &dec("100.00"), "USD")
            .await
            .unwrap();

        coordinator
            .confirm_top_up(&initiated.provider_ref, &dec("100.00"))
            .await
            .unwrap();
        let tx = coordinator
            .finalize_return(&initiated.provider_ref)
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(
            store.get_balance("acct-1").await.unwrap().balance,
            dec("100.00")
        );
    }
}

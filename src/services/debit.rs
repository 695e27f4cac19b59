//! Debit authorization for metered API calls.

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{NewTransaction, TransactionKind};
use crate::error::AppError;
use crate::ports::{CredentialResolver, LedgerStore};

/// Proof that a debit committed; the caller may now serve the metered
/// resource.
#[derive(Debug, Clone, Serialize)]
pub struct DebitReceipt {
    pub account_id: String,
    pub transaction_id: Uuid,
    pub remaining_balance: BigDecimal,
}

pub struct DebitGate {
    store: Arc<dyn LedgerStore>,
    credentials: Arc<dyn CredentialResolver>,
}

impl DebitGate {
    pub fn new(store: Arc<dyn LedgerStore>, credentials: Arc<dyn CredentialResolver>) -> Self {
        Self { store, credentials }
    }

    /// Resolve the token, then check-and-debit atomically. The ledger store
    /// serializes the check-and-apply per account, so two concurrent requests
    /// can never both succeed against a balance that only covers one. The
    /// debit is recorded `completed` synchronously; there is no pending state
    /// for debits.
    pub async fn authorize_and_debit(
        &self,
        token: &str,
        cost: &BigDecimal,
        metadata: Option<serde_json::Value>,
    ) -> Result<DebitReceipt, AppError> {
        let account_id = self.credentials.resolve(token).await?;

        let tx = self
            .store
            .append_transaction(NewTransaction {
                account_id: account_id.clone(),
                kind: TransactionKind::Debit,
                amount: cost.clone(),
                external_ref: None,
                metadata,
            })
            .await?;

        let balance = self.store.get_balance(&account_id).await?;
        tracing::debug!(
            account_id = %account_id,
            transaction_id = %tx.id,
            remaining = %balance.balance,
            "debit applied"
        );

        Ok(DebitReceipt {
            account_id,
            transaction_id: tx.id,
            remaining_balance: balance.balance,
        })
    }
}

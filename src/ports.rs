//! Storage and identity ports. Adapters live under `crate::adapters`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{AccountBalance, LedgerTransaction, NewTransaction, SettleOutcome};
use crate::error::AppError;

/// Single source of truth for balances and transaction history.
///
/// All balance mutations go through `append_transaction` and `settle_pending`;
/// no component touches balance fields directly. Implementations must keep the
/// check-and-apply of a debit atomic per account, and must make settling a
/// pending credit apply at most once, under arbitrary concurrent invocation
/// across processes.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance record. Unknown accounts yield a zero record without
    /// any creation side effect.
    async fn get_balance(&self, account_id: &str) -> Result<AccountBalance, AppError>;

    /// Append a transaction to the ledger.
    ///
    /// Debits are applied immediately and fail with `InsufficientBalance` when
    /// uncovered; top-ups are created `pending`; refunds credit immediately.
    /// If `external_ref` already belongs to a pending or completed transaction,
    /// that transaction is returned and nothing is created; a reference settled
    /// `failed` is dead and the append fails with `InvalidStateTransition`.
    async fn append_transaction(
        &self,
        new_tx: NewTransaction,
    ) -> Result<LedgerTransaction, AppError>;

    /// Settle a pending transaction. `Completed` atomically credits the
    /// account; `Failed` leaves the balance untouched. Re-settling a terminal
    /// transaction with the same outcome is a no-op success; a conflicting
    /// outcome fails with `InvalidStateTransition`.
    async fn settle_pending(
        &self,
        transaction_id: Uuid,
        outcome: SettleOutcome,
    ) -> Result<LedgerTransaction, AppError>;

    /// Look up a transaction by its payment-provider reference, preferring a
    /// completed transaction over a pending one.
    async fn find_by_external_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<LedgerTransaction>, AppError>;

    async fn get_transaction(&self, id: Uuid) -> Result<LedgerTransaction, AppError>;

    /// Most recent transactions for an account, newest first.
    async fn list_transactions(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<LedgerTransaction>, AppError>;

    /// Pending top-ups older than the given age, oldest first. Pending
    /// transactions never expire on their own; operators reconcile them
    /// against the provider.
    async fn list_aged_pending(
        &self,
        older_than: chrono::Duration,
    ) -> Result<Vec<LedgerTransaction>, AppError>;
}

/// Resolves a bearer token to the account it charges. Issuance and lifecycle
/// of credentials belong to the identity provider; the ledger only reads them.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Account id for an active token; `InvalidCredential` when the token is
    /// unknown or revoked.
    async fn resolve(&self, token: &str) -> Result<String, AppError>;
}

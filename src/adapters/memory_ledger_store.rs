//! In-memory implementation of the ledger port.
//!
//! A single mutex over the whole ledger serializes every balance mutation,
//! which satisfies the same atomicity contract the Postgres adapter gets from
//! conditional updates and row locks. Used by the test suites and by the
//! `memory` backend for local development; balances do not survive restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    amount, AccountBalance, LedgerTransaction, NewTransaction, SettleOutcome, TransactionKind,
    TransactionStatus,
};
use crate::error::AppError;
use crate::ports::{CredentialResolver, LedgerStore};

#[derive(Debug, Clone)]
struct Credential {
    account_id: String,
    active: bool,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, AccountBalance>,
    transactions: HashMap<Uuid, LedgerTransaction>,
    by_external_ref: HashMap<String, Uuid>,
    credentials: HashMap<String, Credential>,
}

impl Inner {
    fn credit(&mut self, account_id: &str, amount: &bigdecimal::BigDecimal) {
        let account = self
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(|| AccountBalance::zero(account_id));
        account.balance = &account.balance + amount;
        account.lifetime_credited = &account.lifetime_credited + amount;
        account.updated_at = Utc::now();
    }
}

pub struct MemoryLedgerStore {
    inner: Mutex<Inner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Register an API credential for debit authorization.
    pub async fn seed_credential(&self, token: &str, account_id: &str, active: bool) {
        let mut inner = self.inner.lock().await;
        inner.credentials.insert(
            token.to_string(),
            Credential {
                account_id: account_id.to_string(),
                active,
            },
        );
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_balance(&self, account_id: &str) -> Result<AccountBalance, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .get(account_id)
            .cloned()
            .unwrap_or_else(|| AccountBalance::zero(account_id)))
    }

    async fn append_transaction(
        &self,
        new_tx: NewTransaction,
    ) -> Result<LedgerTransaction, AppError> {
        let amount = amount::validate(&new_tx.amount)?;
        let mut inner = self.inner.lock().await;

        // An external reference keys at most one live transaction. A retried
        // append returns the existing row; a reference already settled failed
        // is dead and cannot be reopened.
        if let Some(external_ref) = &new_tx.external_ref {
            if let Some(existing) = inner
                .by_external_ref
                .get(external_ref)
                .and_then(|id| inner.transactions.get(id))
            {
                match existing.status {
                    TransactionStatus::Completed | TransactionStatus::Pending => {
                        return Ok(existing.clone());
                    }
                    TransactionStatus::Failed => {
                        return Err(AppError::InvalidStateTransition(format!(
                            "external reference {} already settled failed",
                            external_ref
                        )));
                    }
                }
            }
        }

        let status = match new_tx.kind {
            TransactionKind::Debit => {
                let balance = inner
                    .accounts
                    .get(&new_tx.account_id)
                    .map(|a| a.balance.clone())
                    .unwrap_or_else(amount::zero);
                if balance < amount {
                    return Err(AppError::InsufficientBalance {
                        balance,
                        required: amount,
                    });
                }
                let account = inner
                    .accounts
                    .entry(new_tx.account_id.clone())
                    .or_insert_with(|| AccountBalance::zero(&new_tx.account_id));
                account.balance = &account.balance - &amount;
                account.lifetime_debited = &account.lifetime_debited + &amount;
                account.updated_at = Utc::now();
                TransactionStatus::Completed
            }
            TransactionKind::Refund => {
                inner.credit(&new_tx.account_id, &amount);
                TransactionStatus::Completed
            }
            TransactionKind::TopUp => TransactionStatus::Pending,
        };

        let tx = LedgerTransaction::new(
            NewTransaction {
                amount,
                ..new_tx
            },
            status,
        );
        if let Some(external_ref) = &tx.external_ref {
            inner.by_external_ref.insert(external_ref.clone(), tx.id);
        }
        inner.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn settle_pending(
        &self,
        transaction_id: Uuid,
        outcome: SettleOutcome,
    ) -> Result<LedgerTransaction, AppError> {
        let mut inner = self.inner.lock().await;

        let (status, account_id, amount) = {
            let tx = inner
                .transactions
                .get(&transaction_id)
                .ok_or_else(|| AppError::UnknownReference(transaction_id.to_string()))?;
            (tx.status, tx.account_id.clone(), tx.amount.clone())
        };

        if status.is_terminal() {
            // Tolerate retried settlement with the same outcome.
            if status == outcome.as_status() {
                return Ok(inner.transactions[&transaction_id].clone());
            }
            return Err(AppError::InvalidStateTransition(format!(
                "transaction {} is already {}",
                transaction_id, status
            )));
        }

        if outcome == SettleOutcome::Completed {
            inner.credit(&account_id, &amount);
        }

        let tx = inner
            .transactions
            .get_mut(&transaction_id)
            .ok_or_else(|| AppError::UnknownReference(transaction_id.to_string()))?;
        tx.status = outcome.as_status();
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn find_by_external_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<LedgerTransaction>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_external_ref
            .get(external_ref)
            .and_then(|id| inner.transactions.get(id))
            .cloned())
    }

    async fn get_transaction(&self, id: Uuid) -> Result<LedgerTransaction, AppError> {
        let inner = self.inner.lock().await;
        inner
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::UnknownReference(id.to_string()))
    }

    async fn list_transactions(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        let inner = self.inner.lock().await;
        let mut txs: Vec<_> = inner
            .transactions
            .values()
            .filter(|tx| tx.account_id == account_id)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        txs.truncate(limit.max(0) as usize);
        Ok(txs)
    }

    async fn list_aged_pending(
        &self,
        older_than: chrono::Duration,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        let cutoff = Utc::now() - older_than;
        let inner = self.inner.lock().await;
        let mut txs: Vec<_> = inner
            .transactions
            .values()
            .filter(|tx| tx.status == TransactionStatus::Pending && tx.created_at <= cutoff)
            .cloned()
            .collect();
        txs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(txs)
    }
}

#[async_trait]
impl CredentialResolver for MemoryLedgerStore {
    async fn resolve(&self, token: &str) -> Result<String, AppError> {
        let inner = self.inner.lock().await;
        match inner.credentials.get(token) {
            Some(credential) if credential.active => Ok(credential.account_id.clone()),
            _ => Err(AppError::InvalidCredential),
        }
    }
}

//! Ledger transaction entity.
//! Framework-agnostic representation of a single balance-affecting event.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    TopUp,
    Debit,
    Refund,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::TopUp => "top_up",
            TransactionKind::Debit => "debit",
            TransactionKind::Refund => "refund",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top_up" => Ok(TransactionKind::TopUp),
            "debit" => Ok(TransactionKind::Debit),
            "refund" => Ok(TransactionKind::Refund),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Terminal statuses are immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed
        )
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome a pending transaction is settled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Completed,
    Failed,
}

impl SettleOutcome {
    pub fn as_status(&self) -> TransactionStatus {
        match self {
            SettleOutcome::Completed => TransactionStatus::Completed,
            SettleOutcome::Failed => TransactionStatus::Failed,
        }
    }
}

/// A single entry in an account's append-only transaction history.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub account_id: String,
    pub kind: TransactionKind,
    pub amount: BigDecimal,
    pub status: TransactionStatus,
    pub external_ref: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerTransaction {
    pub fn new(new_tx: NewTransaction, status: TransactionStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id: new_tx.account_id,
            kind: new_tx.kind,
            amount: new_tx.amount,
            status,
            external_ref: new_tx.external_ref,
            metadata: new_tx.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for appending a transaction to the ledger. The amount is a positive
/// magnitude; the kind decides the direction and the initial status.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: String,
    pub kind: TransactionKind,
    pub amount: BigDecimal,
    pub external_ref: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

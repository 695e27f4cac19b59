//! Postgres implementation of the ledger port.
//!
//! Per-account serialization comes from the storage layer: a debit is a single
//! conditional `UPDATE ... WHERE balance >= amount` and a settlement takes a
//! `FOR UPDATE` lock on the ledger row, each inside one database transaction
//! with its history insert. A partial unique index on completed external
//! references backs the at-most-one-credit-per-payment invariant across
//! processes.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    amount, AccountBalance, LedgerTransaction, NewTransaction, SettleOutcome, TransactionKind,
    TransactionStatus,
};
use crate::error::AppError;
use crate::ports::{CredentialResolver, LedgerStore};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(16)
        .connect(database_url)
        .await
}

#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_row(
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tx: &LedgerTransaction,
    ) -> Result<LedgerRow, sqlx::Error> {
        sqlx::query_as::<_, LedgerRow>(
            r#"
            INSERT INTO ledger_transactions (
                id, account_id, kind, amount, status, external_ref, metadata,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(&tx.account_id)
        .bind(tx.kind.as_str())
        .bind(&tx.amount)
        .bind(tx.status.as_str())
        .bind(&tx.external_ref)
        .bind(&tx.metadata)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&mut **executor)
        .await
    }

    async fn credit_account(
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        account_id: &str,
        amount: &BigDecimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, balance, lifetime_credited, lifetime_debited, updated_at)
            VALUES ($1, $2, $2, 0, NOW())
            ON CONFLICT (id) DO UPDATE SET
                balance = accounts.balance + EXCLUDED.balance,
                lifetime_credited = accounts.lifetime_credited + EXCLUDED.balance,
                updated_at = NOW()
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .execute(&mut **executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn get_balance(&self, account_id: &str) -> Result<AccountBalance, AppError> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .map(AccountRow::into_domain)
            .unwrap_or_else(|| AccountBalance::zero(account_id)))
    }

    async fn append_transaction(
        &self,
        new_tx: NewTransaction,
    ) -> Result<LedgerTransaction, AppError> {
        let amount = amount::validate(&new_tx.amount)?;
        let mut db_tx = self.pool.begin().await?;

        // An external reference keys at most one live transaction. A retried
        // append returns the existing row; a reference already settled failed
        // is dead and cannot be reopened.
        if let Some(external_ref) = &new_tx.external_ref {
            let existing = sqlx::query_as::<_, LedgerRow>(
                r#"
                SELECT * FROM ledger_transactions
                WHERE external_ref = $1
                ORDER BY (status = 'completed') DESC, created_at DESC
                LIMIT 1
                "#,
            )
            .bind(external_ref)
            .fetch_optional(&mut *db_tx)
            .await?;

            if let Some(row) = existing {
                db_tx.rollback().await?;
                return match row.status()? {
                    TransactionStatus::Completed | TransactionStatus::Pending => row.into_domain(),
                    TransactionStatus::Failed => Err(AppError::InvalidStateTransition(format!(
                        "external reference {} already settled failed",
                        external_ref
                    ))),
                };
            }
        }

        let status = match new_tx.kind {
            TransactionKind::Debit => {
                let updated = sqlx::query(
                    r#"
                    UPDATE accounts
                    SET balance = balance - $2,
                        lifetime_debited = lifetime_debited + $2,
                        updated_at = NOW()
                    WHERE id = $1 AND balance >= $2
                    "#,
                )
                .bind(&new_tx.account_id)
                .bind(&amount)
                .execute(&mut *db_tx)
                .await?
                .rows_affected();

                if updated == 0 {
                    let balance: Option<BigDecimal> =
                        sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
                            .bind(&new_tx.account_id)
                            .fetch_optional(&mut *db_tx)
                            .await?;
                    db_tx.rollback().await?;
                    return Err(AppError::InsufficientBalance {
                        balance: balance.unwrap_or_else(amount::zero),
                        required: amount,
                    });
                }
                TransactionStatus::Completed
            }
            TransactionKind::Refund => {
                Self::credit_account(&mut db_tx, &new_tx.account_id, &amount).await?;
                TransactionStatus::Completed
            }
            TransactionKind::TopUp => TransactionStatus::Pending,
        };

        let tx = LedgerTransaction::new(NewTransaction { amount, ..new_tx }, status);
        let row = Self::insert_row(&mut db_tx, &tx).await?;
        db_tx.commit().await?;
        row.into_domain()
    }

    async fn settle_pending(
        &self,
        transaction_id: Uuid,
        outcome: SettleOutcome,
    ) -> Result<LedgerTransaction, AppError> {
        let mut db_tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LedgerRow>(
            "SELECT * FROM ledger_transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(transaction_id)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| AppError::UnknownReference(transaction_id.to_string()))?;

        let current = row.status()?;
        if current.is_terminal() {
            db_tx.rollback().await?;
            // Tolerate retried settlement with the same outcome.
            if current == outcome.as_status() {
                return row.into_domain();
            }
            return Err(AppError::InvalidStateTransition(format!(
                "transaction {} is already {}",
                transaction_id, current
            )));
        }

        if outcome == SettleOutcome::Completed {
            Self::credit_account(&mut db_tx, &row.account_id, &row.amount).await?;
        }

        let settled = sqlx::query_as::<_, LedgerRow>(
            r#"
            UPDATE ledger_transactions
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(transaction_id)
        .bind(outcome.as_status().as_str())
        .fetch_one(&mut *db_tx)
        .await?;

        db_tx.commit().await?;
        settled.into_domain()
    }

    async fn find_by_external_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<LedgerTransaction>, AppError> {
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT * FROM ledger_transactions
            WHERE external_ref = $1
            ORDER BY (status = 'completed') DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(external_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LedgerRow::into_domain).transpose()
    }

    async fn get_transaction(&self, id: Uuid) -> Result<LedgerTransaction, AppError> {
        let row =
            sqlx::query_as::<_, LedgerRow>("SELECT * FROM ledger_transactions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| AppError::UnknownReference(id.to_string()))?;

        row.into_domain()
    }

    async fn list_transactions(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT * FROM ledger_transactions
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerRow::into_domain).collect()
    }

    async fn list_aged_pending(
        &self,
        older_than: chrono::Duration,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        let cutoff = Utc::now() - older_than;
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT * FROM ledger_transactions
            WHERE status = 'pending' AND created_at <= $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerRow::into_domain).collect()
    }
}

#[async_trait]
impl CredentialResolver for PostgresLedgerStore {
    async fn resolve(&self, token: &str) -> Result<String, AppError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT account_id, status FROM api_credentials WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((account_id, status)) if status == "active" => Ok(account_id),
            _ => Err(AppError::InvalidCredential),
        }
    }
}

/// Internal row type for sqlx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    account_id: String,
    kind: String,
    amount: BigDecimal,
    status: String,
    external_ref: Option<String>,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LedgerRow {
    fn status(&self) -> Result<TransactionStatus, AppError> {
        self.status.parse().map_err(AppError::Internal)
    }

    fn into_domain(self) -> Result<LedgerTransaction, AppError> {
        Ok(LedgerTransaction {
            kind: self.kind.parse().map_err(AppError::Internal)?,
            status: self.status.parse().map_err(AppError::Internal)?,
            id: self.id,
            account_id: self.account_id,
            amount: self.amount,
            external_ref: self.external_ref,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: String,
    balance: BigDecimal,
    lifetime_credited: BigDecimal,
    lifetime_debited: BigDecimal,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_domain(self) -> AccountBalance {
        AccountBalance {
            account_id: self.id,
            balance: self.balance,
            lifetime_credited: self.lifetime_credited,
            lifetime_debited: self.lifetime_debited,
            updated_at: self.updated_at,
        }
    }
}

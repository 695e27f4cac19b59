use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::amount;

/// Current balance of a prepaid account, derived from its completed ledger
/// transactions. Invariant: `balance == lifetime_credited - lifetime_debited`
/// and is never negative.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub account_id: String,
    pub balance: BigDecimal,
    pub lifetime_credited: BigDecimal,
    pub lifetime_debited: BigDecimal,
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Zero-balance record for an account with no ledger history. Reads of
    /// unknown accounts return this without creating anything.
    pub fn zero(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            balance: amount::zero(),
            lifetime_credited: amount::zero(),
            lifetime_debited: amount::zero(),
            updated_at: Utc::now(),
        }
    }
}

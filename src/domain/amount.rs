//! Amount validation and normalization.
//!
//! All ledger amounts are decimal values with exactly two fractional digits
//! (minor units of cents). Amounts carrying more precision are rejected,
//! never rounded.

use bigdecimal::BigDecimal;

use crate::error::AppError;

/// Fractional digits every ledger amount is normalized to.
pub const SCALE: i64 = 2;

/// A zero balance at ledger scale.
pub fn zero() -> BigDecimal {
    BigDecimal::from(0).with_scale(SCALE)
}

/// Validate a caller-supplied amount and return it at ledger scale.
///
/// Fails with `InvalidAmount` if the amount is not strictly positive or does
/// not fit in two decimal places.
pub fn validate(amount: &BigDecimal) -> Result<BigDecimal, AppError> {
    if *amount <= BigDecimal::from(0) {
        return Err(AppError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }

    let normalized = amount.with_scale(SCALE);
    if normalized != *amount {
        return Err(AppError::InvalidAmount(format!(
            "amount {} has more than {} decimal places",
            amount, SCALE
        )));
    }

    Ok(normalized)
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bigdecimal::BigDecimal;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid or revoked credential")]
    InvalidCredential,

    #[error("insufficient balance: available {balance}, required {required}")]
    InsufficientBalance {
        balance: BigDecimal,
        required: BigDecimal,
    },

    #[error("unknown reference: {0}")]
    UnknownReference(String),

    #[error("amount mismatch: recorded {recorded}, confirmed {confirmed}")]
    AmountMismatch {
        recorded: BigDecimal,
        confirmed: BigDecimal,
    },

    #[error("webhook signature verification failed")]
    SignatureInvalid,

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredential | AppError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            AppError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::UnknownReference(_) => StatusCode::NOT_FOUND,
            AppError::AmountMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidStateTransition(_) => StatusCode::CONFLICT,
            AppError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code carried in every error response body.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::InvalidAmount(_) => "invalid_amount",
            AppError::InvalidCredential => "invalid_credential",
            AppError::InsufficientBalance { .. } => "insufficient_balance",
            AppError::UnknownReference(_) => "unknown_reference",
            AppError::AmountMismatch { .. } => "amount_mismatch",
            AppError::SignatureInvalid => "signature_invalid",
            AppError::InvalidStateTransition(_) => "invalid_state_transition",
            AppError::ProviderUnavailable(_) => "provider_unavailable",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // An insufficient-funds response carries enough detail for the caller
        // to act: current balance, required amount, and the shortfall.
        let body = match &self {
            AppError::InsufficientBalance { balance, required } => Json(json!({
                "error": self.to_string(),
                "reason": self.reason(),
                "status": status.as_u16(),
                "balance": balance.to_string(),
                "required": required.to_string(),
                "shortfall": (required - balance).to_string(),
            })),
            _ => Json(json!({
                "error": self.to_string(),
                "reason": self.reason(),
                "status": status.as_u16(),
            })),
        };

        (status, body).into_response()
    }
}

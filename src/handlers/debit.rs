use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DebitRequest {
    pub cost: BigDecimal,
    pub metadata: Option<serde_json::Value>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Token-authorized deduction. The metered resource behind the caller must
/// only be served after this returns success; the receipt carries the
/// committed debit's id and the remaining balance.
pub async fn debit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DebitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::InvalidCredential)?;

    let receipt = state
        .debit
        .authorize_and_debit(token, &request.cost, request.metadata)
        .await?;

    Ok(Json(receipt))
}

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub account_id: String,
    pub amount: BigDecimal,
    pub currency: String,
}

pub async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<TopUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let initiated = state
        .topup
        .initiate_top_up(&request.account_id, &request.amount, &request.currency)
        .await?;

    Ok((StatusCode::CREATED, Json(initiated)))
}

#[derive(Debug, Deserialize)]
pub struct ReturnParams {
    pub provider_ref: String,
}

/// Finalizer for the user's redirect back from the provider. The query
/// parameter only names the order; the provider capture decides the outcome.
/// A failed top-up comes back as a reason code for the billing view rather
/// than an error status.
pub async fn finalize_return(
    State(state): State<AppState>,
    Query(params): Query<ReturnParams>,
) -> Result<Response, AppError> {
    match state.topup.finalize_return(&params.provider_ref).await {
        Ok(tx) => Ok((
            StatusCode::OK,
            Json(json!({
                "transaction_id": tx.id,
                "status": tx.status,
                "amount": tx.amount.to_string(),
            })),
        )
            .into_response()),
        Err(err @ AppError::AmountMismatch { .. }) => {
            tracing::warn!(provider_ref = %params.provider_ref, error = %err, "top-up failed on return");
            Ok((
                StatusCode::OK,
                Json(json!({
                    "status": "failed",
                    "reason": err.reason(),
                })),
            )
                .into_response())
        }
        Err(err) => Err(err),
    }
}

//! Asynchronous finalizer for provider payment confirmations.
//!
//! Deliveries may arrive zero, one, or many times. A verified completed
//! confirmation settles the matching pending top-up. Anything else (bad
//! signature, unknown reference, amount mismatch) is logged for operators
//! and acknowledged with a 200 no-op so the provider does not retry-storm.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{SettleOutcome, TransactionStatus};
use crate::error::AppError;
use crate::handlers::auth::{verify_signature, SIGNATURE_HEADER};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub order_id: String,
    pub amount: BigDecimal,
    #[allow(dead_code)]
    pub currency: Option<String>,
}

fn acknowledged(applied: bool, reason: &str) -> Json<serde_json::Value> {
    Json(json!({
        "received": true,
        "applied": applied,
        "reason": reason,
    }))
}

pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if let Err(err) = verify_signature(&state.config.provider_webhook_secret, &body, signature) {
        tracing::warn!(provider = %provider, error = %err, "webhook rejected");
        return acknowledged(false, err.reason());
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(provider = %provider, error = %err, "webhook payload malformed");
            return acknowledged(false, "malformed_payload");
        }
    };

    match payload.event.as_str() {
        "order.completed" => {
            match state
                .topup
                .confirm_top_up(&payload.order_id, &payload.amount)
                .await
            {
                Ok(tx) => {
                    tracing::info!(provider = %provider, order_id = %payload.order_id, ledger_ref = %tx.id, "webhook settled top-up");
                    acknowledged(true, "settled")
                }
                Err(err) => {
                    tracing::warn!(provider = %provider, order_id = %payload.order_id, error = %err, "webhook confirmation not applied");
                    acknowledged(false, err.reason())
                }
            }
        }
        "order.declined" => match decline(&state, &payload.order_id).await {
            Ok(applied) => acknowledged(applied, "declined"),
            Err(err) => {
                tracing::warn!(provider = %provider, order_id = %payload.order_id, error = %err, "webhook decline not applied");
                acknowledged(false, err.reason())
            }
        },
        other => {
            tracing::debug!(provider = %provider, event = other, "ignoring webhook event");
            acknowledged(false, "unhandled_event")
        }
    }
}

async fn decline(state: &AppState, order_id: &str) -> Result<bool, AppError> {
    let tx = state
        .store
        .find_by_external_ref(order_id)
        .await?
        .ok_or_else(|| AppError::UnknownReference(order_id.to_string()))?;

    if tx.status != TransactionStatus::Pending {
        return Ok(false);
    }
    state.store.settle_pending(tx.id, SettleOutcome::Failed).await?;
    Ok(true)
}

//! Operator endpoints. Pending top-ups never auto-fail; this surface lets an
//! operator list aged ones and reconcile them against the provider.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PendingParams {
    pub min_age_secs: Option<i64>,
}

pub async fn list_pending(
    State(state): State<AppState>,
    Query(params): Query<PendingParams>,
) -> Result<impl IntoResponse, AppError> {
    let min_age = chrono::Duration::seconds(params.min_age_secs.unwrap_or(3600).max(0));
    let pending = state.store.list_aged_pending(min_age).await?;

    Ok(Json(json!({
        "count": pending.len(),
        "transactions": pending,
    })))
}

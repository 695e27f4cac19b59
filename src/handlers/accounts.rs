use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

pub async fn get_balance(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let balance = state.store.get_balance(&account_id).await?;
    Ok(Json(balance))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.store.get_transaction(id).await?;
    Ok(Json(tx))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let txs = state.store.list_transactions(&account_id, limit).await?;
    Ok(Json(txs))
}

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod debit;
pub mod topup;
pub mod webhook;

use axum::Json;
use serde_json::json;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

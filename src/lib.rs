pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod provider;
pub mod services;
pub mod startup;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::ports::{CredentialResolver, LedgerStore};
use crate::provider::PaymentProvider;
use crate::services::{DebitGate, TopUpCoordinator};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn LedgerStore>,
    pub topup: Arc<TopUpCoordinator>,
    pub debit: Arc<DebitGate>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn LedgerStore>,
        credentials: Arc<dyn CredentialResolver>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let topup = Arc::new(TopUpCoordinator::new(
            store.clone(),
            provider,
            config.min_topup_amount.clone(),
        ));
        let debit = Arc::new(DebitGate::new(store.clone(), credentials));
        Self {
            config,
            store,
            topup,
            debit,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/reconciliation/pending",
            get(handlers::admin::list_pending),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.config.clone(),
            middleware::auth::admin_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/topup", post(handlers::topup::initiate))
        .route(
            "/topup/return",
            get(handlers::topup::finalize_return).post(handlers::topup::finalize_return),
        )
        .route("/webhook/:provider", post(handlers::webhook::receive))
        .route("/debit", post(handlers::debit::debit))
        .route("/balance/:account_id", get(handlers::accounts::get_balance))
        .route(
            "/accounts/:account_id/transactions",
            get(handlers::accounts::list_transactions),
        )
        .route("/transactions/:id", get(handlers::accounts::get_transaction))
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credits_core::adapters::{postgres_ledger_store, MemoryLedgerStore, PostgresLedgerStore};
use credits_core::config::{Config, LedgerBackend};
use credits_core::ports::{CredentialResolver, LedgerStore};
use credits_core::provider::{PaymentProvider, RestPaymentProvider};
use credits_core::{create_app, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut pool: Option<PgPool> = None;
    let (store, credentials): (Arc<dyn LedgerStore>, Arc<dyn CredentialResolver>) =
        match config.ledger_backend {
            LedgerBackend::Postgres => {
                let database_url = config
                    .database_url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres backend"))?;
                let pg = postgres_ledger_store::create_pool(&database_url).await?;

                let migrator = Migrator::new(Path::new("./migrations")).await?;
                migrator.run(&pg).await?;
                tracing::info!("database migrations completed");

                let ledger = Arc::new(PostgresLedgerStore::new(pg.clone()));
                pool = Some(pg);
                (ledger.clone(), ledger)
            }
            LedgerBackend::Memory => {
                tracing::warn!("using in-memory ledger store; balances will not survive restart");
                let ledger = Arc::new(MemoryLedgerStore::new());
                (ledger.clone(), ledger)
            }
        };

    let provider: Arc<dyn PaymentProvider> = Arc::new(RestPaymentProvider::new(
        config.provider_api_url.clone(),
        config.provider_api_key.clone(),
    ));

    if config.validate_on_startup {
        let report = startup::validate_environment(&config, pool.as_ref()).await?;
        report.log();
        if !report.is_valid() {
            anyhow::bail!("startup validation failed");
        }
    }

    let state = AppState::new(Arc::new(config.clone()), store, credentials, provider);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

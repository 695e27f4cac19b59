//! Boot-time environment validation.

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::{Config, LedgerBackend};

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub provider: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.provider
    }

    pub fn log(&self) {
        tracing::info!(
            environment = self.environment,
            database = self.database,
            provider = self.provider,
            "startup validation report"
        );
        for error in &self.errors {
            tracing::error!("startup validation: {}", error);
        }
    }
}

pub async fn validate_environment(
    config: &Config,
    pool: Option<&PgPool>,
) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        provider: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("environment: {}", e));
    }

    match (config.ledger_backend, pool) {
        (LedgerBackend::Postgres, Some(pool)) => {
            if let Err(e) = validate_database(pool).await {
                report.database = false;
                report.errors.push(format!("database: {}", e));
            }
        }
        (LedgerBackend::Postgres, None) => {
            report.database = false;
            report
                .errors
                .push("database: postgres backend selected but no pool constructed".to_string());
        }
        (LedgerBackend::Memory, _) => {}
    }

    if let Err(e) = validate_provider(&config.provider_api_url).await {
        report.provider = false;
        report.errors.push(format!("provider: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.ledger_backend == LedgerBackend::Postgres && config.database_url.is_none() {
        anyhow::bail!("DATABASE_URL is required for the postgres backend");
    }
    if config.admin_api_key.is_empty() {
        anyhow::bail!("ADMIN_API_KEY is empty");
    }
    if config.provider_webhook_secret.is_empty() {
        anyhow::bail!("PROVIDER_WEBHOOK_SECRET is empty");
    }
    if config.min_topup_amount <= BigDecimal::from(0) {
        anyhow::bail!("MIN_TOPUP_AMOUNT must be positive");
    }

    url::Url::parse(&config.provider_api_url).context("PROVIDER_API_URL is not a valid URL")?;

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("no migrations applied");
    }

    Ok(())
}

async fn validate_provider(provider_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client
        .get(provider_url)
        .send()
        .await
        .context("failed to reach payment provider")?;

    if response.status().is_server_error() {
        anyhow::bail!("provider returned status {}", response.status());
    }

    Ok(())
}

use anyhow::Context;
use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

/// Storage backend for the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    Postgres,
    Memory,
}

impl FromStr for LedgerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(LedgerBackend::Postgres),
            "memory" => Ok(LedgerBackend::Memory),
            other => anyhow::bail!("unknown ledger backend: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub ledger_backend: LedgerBackend,
    pub database_url: Option<String>,
    pub provider_api_url: String,
    pub provider_api_key: String,
    pub provider_webhook_secret: String,
    pub admin_api_key: String,
    pub min_topup_amount: BigDecimal,
    pub validate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            ledger_backend: env::var("LEDGER_BACKEND")
                .unwrap_or_else(|_| "postgres".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL").ok(),
            provider_api_url: env::var("PROVIDER_API_URL")?,
            provider_api_key: env::var("PROVIDER_API_KEY")?,
            provider_webhook_secret: env::var("PROVIDER_WEBHOOK_SECRET")?,
            admin_api_key: env::var("ADMIN_API_KEY")?,
            min_topup_amount: env::var("MIN_TOPUP_AMOUNT")
                .unwrap_or_else(|_| "5.00".to_string())
                .parse::<BigDecimal>()
                .context("MIN_TOPUP_AMOUNT is not a valid decimal")?,
            validate_on_startup: env::var("VALIDATE_ON_STARTUP")
                .map(|v| v == "1" || v == "true")
                .unwrap_or(false),
        })
    }
}

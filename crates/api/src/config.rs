use ledger_core::commission::{validate_percent, DEFAULT_COMMISSION_PERCENT};
use rust_decimal::Decimal;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for in-flight requests at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub ledger: LedgerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            ledger: LedgerConfig::from_env(),
        }
    }
}

/// Ledger policy knobs.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Commission percent for therapists without a configured rate.
    pub default_commission_percent: Decimal,
}

impl LedgerConfig {
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `DEFAULT_COMMISSION_PERCENT` | `50`    |
    ///
    /// # Panics
    ///
    /// Panics if the value is not a decimal in `0..=100`.
    pub fn from_env() -> Self {
        let default_commission_percent: Decimal = std::env::var("DEFAULT_COMMISSION_PERCENT")
            .unwrap_or_else(|_| DEFAULT_COMMISSION_PERCENT.to_string())
            .parse()
            .expect("DEFAULT_COMMISSION_PERCENT must be a decimal");
        validate_percent(default_commission_percent)
            .expect("DEFAULT_COMMISSION_PERCENT must be between 0 and 100");

        Self {
            default_commission_percent,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_commission_percent: Decimal::from(DEFAULT_COMMISSION_PERCENT),
        }
    }
}

//! Runtime configuration read from the environment (a `.env` file is loaded
//! first when present).

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

const DEFAULT_DATABASE_URL: &str = "sqlite:./crowdfund.sqlite?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub gateway: GatewayConfig,
    /// `None` disables request rate limiting.
    pub rate_limit: Option<RateLimitConfig>,
    /// Operator account ensured at startup.
    pub admin: Option<AdminAccount>,
}

/// Set `ADMIN_USER_NAME` and `ADMIN_EMAIL` together, or neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub user_name: String,
    pub email: String,
}

/// Settings for the background worker, which never talks to the gateway.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub reconcile_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_base: Url,
    pub secret_key: String,
    pub publishable_key: String,
    /// Lower-case ISO 4217 code used for every pledge.
    pub currency: String,
    pub timeout: Duration,
    /// Total time budget for retrying transient gateway failures.
    pub retry_max_elapsed: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub period: Duration,
    pub burst_size: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let bind_addr = parse_var("BIND_ADDR", DEFAULT_BIND_ADDR)?;

        let api_base_raw =
            env::var("STRIPE_API_BASE").unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string());
        let api_base = Url::parse(&api_base_raw).map_err(|e| ConfigError::Invalid {
            name: "STRIPE_API_BASE",
            reason: e.to_string(),
        })?;

        let secret_key =
            env::var("STRIPE_SECRET_KEY").map_err(|_| ConfigError::Missing("STRIPE_SECRET_KEY"))?;
        let publishable_key = env::var("STRIPE_PUBLISHABLE_KEY")
            .map_err(|_| ConfigError::Missing("STRIPE_PUBLISHABLE_KEY"))?;

        let currency = normalize_currency(
            &env::var("PLEDGE_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
        )?;

        let timeout = Duration::from_secs(parse_var("GATEWAY_TIMEOUT_SECS", "30")?);
        let retry_max_elapsed = Duration::from_secs(parse_var("GATEWAY_RETRY_MAX_SECS", "20")?);

        let burst_size: u32 = parse_var("RATE_LIMIT_BURST", "10")?;
        let rate_limit = if burst_size == 0 {
            None
        } else {
            Some(RateLimitConfig {
                period: Duration::from_secs(parse_var("RATE_LIMIT_PERIOD_SECS", "60")?),
                burst_size,
            })
        };

        let admin = admin_account(
            env::var("ADMIN_USER_NAME").ok(),
            env::var("ADMIN_EMAIL").ok(),
        )?;

        Ok(Self {
            database_url,
            bind_addr,
            gateway: GatewayConfig {
                api_base,
                secret_key,
                publishable_key,
                currency,
                timeout,
                retry_max_elapsed,
            },
            rate_limit,
            admin,
        })
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let interval_secs: u64 = parse_var("RECONCILE_INTERVAL_SECS", "900")?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "RECONCILE_INTERVAL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            database_url,
            reconcile_interval: Duration::from_secs(interval_secs),
        })
    }
}

fn parse_var<T>(name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn admin_account(
    user_name: Option<String>,
    email: Option<String>,
) -> Result<Option<AdminAccount>, ConfigError> {
    let user_name = user_name.filter(|v| !v.trim().is_empty());
    let email = email.filter(|v| !v.trim().is_empty());
    match (user_name, email) {
        (Some(user_name), Some(email)) => Ok(Some(AdminAccount { user_name, email })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Missing("ADMIN_EMAIL")),
        (None, Some(_)) => Err(ConfigError::Missing("ADMIN_USER_NAME")),
    }
}

pub fn normalize_currency(raw: &str) -> Result<String, ConfigError> {
    let code = raw.trim().to_ascii_lowercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(ConfigError::Invalid {
            name: "PLEDGE_CURRENCY",
            reason: format!("'{}' is not a three-letter currency code", raw),
        })
    }
}

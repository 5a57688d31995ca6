//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::FixedOffset;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "courier-dev-secret-change-me";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub statement_timeout: Duration,
    pub lock_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `None` runs against the in-memory repository.
    pub database: Option<DatabaseConfig>,
    /// Bounded wait for the in-memory repository's lock.
    pub lock_timeout: Duration,
    /// Offset the stores' opening hours are written in.
    pub store_utc_offset: FixedOffset,
    /// True when running with `APP_ENV=dev`.
    pub dev_mode: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let dev_mode = get("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("dev"));

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: format!("{e}"),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if dev_mode => {
                tracing::warn!("JWT_SECRET not set; using the insecure development secret");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let statement_timeout =
            Duration::from_millis(parse_u64(&get, "DB_STATEMENT_TIMEOUT_MS", 5_000)?);
        let lock_timeout = Duration::from_millis(parse_u64(&get, "DB_LOCK_TIMEOUT_MS", 3_000)?);
        let max_connections = u32::try_from(parse_u64(&get, "DB_MAX_CONNECTIONS", 10)?)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                reason: "must be between 1 and u32::MAX".into(),
            })?;

        let database = get("DATABASE_URL").map(|url| DatabaseConfig {
            url,
            max_connections,
            statement_timeout,
            lock_timeout,
        });

        let offset_minutes: i32 = match get("STORE_UTC_OFFSET_MINUTES") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "STORE_UTC_OFFSET_MINUTES",
                reason: format!("'{raw}' is not an integer"),
            })?,
            None => 0,
        };
        let store_utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::Invalid {
                name: "STORE_UTC_OFFSET_MINUTES",
                reason: "must be within +/- 24h".into(),
            })?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            database,
            lock_timeout,
            store_utc_offset,
            dev_mode,
        })
    }
}

fn parse_u64<G>(get: &G, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("'{raw}' is not a non-negative integer"),
        }),
        None => Ok(default),
    }
}

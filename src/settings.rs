//! Process configuration from the environment. Call `dotenvy::dotenv()` first to pick up `.env`.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEV_TOKEN_SECRET: &str = "entity-query-dev-secret";

#[derive(Clone, Debug)]
pub struct Settings {
    /// Unset means the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Unset means the built-in catalog.
    pub schema_path: Option<PathBuf>,
    pub token_secret: String,
    pub token_ttl_secs: Option<i64>,
    pub body_limit_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {var}: {value}")]
pub struct SettingsError {
    pub var: &'static str,
    pub value: String,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, SettingsError> {
    match var(name) {
        None => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| SettingsError { var: name, value: v }),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let token_secret = match var("TOKEN_SECRET") {
            Some(s) => s,
            None => {
                tracing::warn!("TOKEN_SECRET not set; using the development secret");
                DEV_TOKEN_SECRET.to_string()
            }
        };
        Ok(Settings {
            database_url: var("DATABASE_URL"),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?.unwrap_or(5),
            bind_addr: parse_var("BIND_ADDR")?.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000))),
            schema_path: var("SCHEMA_PATH").map(PathBuf::from),
            token_secret,
            token_ttl_secs: parse_var("TOKEN_TTL_SECS")?,
            body_limit_bytes: parse_var("BODY_LIMIT_BYTES")?.unwrap_or(1024 * 1024),
        })
    }
}

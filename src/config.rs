use std::env;
use std::net::SocketAddr;

use thiserror::Error;

use crate::notify::WebhookConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    /// Seed a starter directory into an empty database on startup.
    pub seed_demo_data: bool,
    /// Events are only logged when no webhook is configured.
    pub webhook: Option<WebhookConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://timetables.db".to_string());
        let bind_addr = parse_var("BIND_ADDR", "127.0.0.1:3000")?;
        let max_connections = parse_var("DB_MAX_CONNECTIONS", "5")?;
        let seed_demo_data = parse_var("SEED_DEMO_DATA", "false")?;

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            seed_demo_data,
            webhook: WebhookConfig::from_env(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { key, value })
}

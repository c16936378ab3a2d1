use std::net::SocketAddr;

use anyhow::{anyhow, Context};

use crate::security::config::SecurityConfig;

/// Reads one configuration key. `std::env::var` in production, a map in tests.
pub type Lookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Memory,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub security: SecurityConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: &Lookup<'_>) -> anyhow::Result<Self> {
        let bind_addr = env_string(lookup, "BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".into())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be host:port")?;

        let store = match env_string(lookup, "STORE_BACKEND")
            .unwrap_or_else(|| "postgres".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => {
                let database_url = env_string(lookup, "DATABASE_URL")
                    .ok_or_else(|| anyhow!("DATABASE_URL missing; required for STORE_BACKEND=postgres"))?;
                let max_connections = match env_string(lookup, "DB_MAX_CONNECTIONS") {
                    Some(raw) => raw
                        .parse::<u32>()
                        .context("DB_MAX_CONNECTIONS must be a number")?,
                    None => 5,
                };
                StoreBackend::Postgres {
                    database_url,
                    max_connections,
                }
            }
            "memory" => StoreBackend::Memory,
            other => return Err(anyhow!("unknown STORE_BACKEND `{other}` (postgres|memory)")),
        };

        Ok(AppConfig {
            bind_addr,
            store,
            security: SecurityConfig::from_lookup(lookup)?,
        })
    }
}

pub(crate) fn env_string(lookup: &Lookup<'_>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn env_bool(lookup: &Lookup<'_>, key: &str) -> Option<bool> {
    env_string(lookup, key).and_then(|v| match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

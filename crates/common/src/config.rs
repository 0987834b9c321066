//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where conversation and message records live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown STORE_BACKEND: {}. Supported backends: postgres, memory",
                other
            )),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL (required for the postgres backend)
    pub database_url: Option<String>,

    /// Storage backend selection
    pub store_backend: StoreBackend,

    /// Auto-responder tuning
    pub autoresponder_timeout_ms: u64,
    pub autoresponder_queue_capacity: usize,

    /// HTTP surface
    pub cors_allowed_origins: Option<String>,

    /// Runtime configuration
    pub rust_log: String,
    pub port: u16,
}

impl std::fmt::Debug for Config {
    #[mutants::skip] // Redaction only, no behavior
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("store_backend", &self.store_backend)
            .field("autoresponder_timeout_ms", &self.autoresponder_timeout_ms)
            .field(
                "autoresponder_queue_capacity",
                &self.autoresponder_queue_capacity,
            )
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("rust_log", &self.rust_log)
            .field("port", &self.port)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_backend = match get("STORE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::default(),
        };

        let database_url = get("DATABASE_URL").filter(|url| !url.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL is required for the postgres store backend"
            ));
        }

        let autoresponder_timeout_ms = parse_or(&get, "AUTORESPONDER_TIMEOUT_MS", 10_000)?;
        let autoresponder_queue_capacity = parse_or(&get, "AUTORESPONDER_QUEUE_CAPACITY", 256)?;
        if autoresponder_queue_capacity == 0 {
            return Err(anyhow::anyhow!(
                "AUTORESPONDER_QUEUE_CAPACITY must be at least 1"
            ));
        }

        Ok(Self {
            database_url,
            store_backend,
            autoresponder_timeout_ms,
            autoresponder_queue_capacity,
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
            rust_log: get("RUST_LOG").unwrap_or_else(|| "parley=debug".to_string()),
            port: get("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
        })
    }

    /// Auto-responder timeout as a `Duration`
    pub fn autoresponder_timeout(&self) -> Duration {
        Duration::from_millis(self.autoresponder_timeout_ms)
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got {:?}", key, raw)),
        None => Ok(default),
    }
}

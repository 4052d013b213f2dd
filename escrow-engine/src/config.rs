//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `ESCROW__*` environment variables (`__` separates sections, so
//! `ESCROW__DATABASE__URL` sets `database.url`).

use std::net::SocketAddr;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{error::EscrowError, EscrowResult};

pub const ENV_PREFIX: &str = "ESCROW";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub orders: OrderServiceConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

/// Configuration for the order lifecycle service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderServiceConfig {
    /// Lowest price an order may be placed at
    pub min_order_price: Decimal,
    /// How many times an operation that lost a race is re-run
    pub max_conflict_retries: u32,
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            min_order_price: Decimal::ONE,
            max_conflict_retries: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl EscrowConfig {
    /// Load defaults, then `path` if it exists, then the environment
    pub fn load(path: Option<&Path>) -> EscrowResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.orders.validate()?;
        Ok(config)
    }

    /// Full validation, including settings only needed to reach the database
    pub fn validate(&self) -> EscrowResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(EscrowError::config(
                "database.url is required (set ESCROW__DATABASE__URL)",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(EscrowError::config(
                "database.max_connections must be at least 1",
            ));
        }
        self.orders.validate()
    }
}

impl OrderServiceConfig {
    pub fn validate(&self) -> EscrowResult<()> {
        if self.min_order_price <= Decimal::ZERO {
            return Err(EscrowError::config(format!(
                "orders.min_order_price must be positive, got {}",
                self.min_order_price
            )));
        }
        Ok(())
    }
}

//! Postgres client wrapper.

use crate::config::PostgresConfig;
use etl_core::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Postgres pool wrapper shared by both store implementations.
#[derive(Clone)]
pub struct PgClient {
    pool: PgPool,
    config: PostgresConfig,
}

impl PgClient {
    /// Connects a pool using the given configuration.
    pub async fn connect(config: PostgresConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::config("database url is empty"));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| Error::store(format!("connect failed: {e}")))?;

        info!(
            max_connections = config.max_connections,
            "Connected Postgres pool"
        );

        Ok(Self { pool, config })
    }

    /// Returns the inner pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }
}

//! Postgres health checks and schema bootstrap.

use crate::client::PgClient;
use etl_core::{Error, Result};
use tracing::{debug, error};

/// Check Postgres connection health.
pub async fn check_connection(client: &PgClient) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(client.pool())
        .await
    {
        Ok(_) => {
            debug!("Postgres connection healthy");
            true
        }
        Err(e) => {
            error!("Postgres health check failed: {}", e);
            false
        }
    }
}

/// Initialize both layer schemas. Idempotent.
pub async fn init_schema(client: &PgClient) -> Result<()> {
    for ddl in crate::schema::all_statements() {
        sqlx::query(ddl)
            .execute(client.pool())
            .await
            .map_err(|e| Error::store(format!("DDL failed: {e}")))?;
    }

    debug!("Postgres schema initialized");
    Ok(())
}

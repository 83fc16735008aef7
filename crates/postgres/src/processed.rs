//! Processed-layer store backed by the `ppl` schema.
//!
//! Facts and their synthetic events are written inside one group
//! transaction, so readers never observe a fact with a partial event set.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Postgres, Transaction};
use tracing::debug;

use etl_core::{
    ClickEvent, Error, NormalizedFact, PositionEvent, ProcessedStore, ProcessedTx, Result,
    RunRecord,
};

use crate::client::PgClient;

/// Write target for normalized facts, synthetic events, and run metadata.
#[derive(Clone)]
pub struct PgProcessedStore {
    client: PgClient,
}

impl PgProcessedStore {
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }
}

fn store_err(e: sqlx::Error) -> Error {
    Error::store(e.to_string())
}

/// One open group transaction. Rolls back on drop unless committed.
struct PgProcessedTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ProcessedTx for PgProcessedTx {
    async fn insert_fact(&mut self, fact: &NormalizedFact) -> Result<Option<i64>> {
        // A key conflict means an earlier run already processed this row;
        // DO NOTHING keeps the group transaction usable.
        sqlx::query_scalar(
            "INSERT INTO ppl.fact_aggregates \
             (date, page_path, query, device, demand, impressions, clicks, avg_position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (date, page_path, query, device) DO NOTHING \
             RETURNING id",
        )
        .bind(fact.date)
        .bind(&fact.page_path)
        .bind(&fact.query)
        .bind(&fact.device)
        .bind(fact.demand)
        .bind(fact.impressions)
        .bind(fact.clicks)
        .bind(fact.position)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_err)
    }

    async fn insert_events(
        &mut self,
        fact_id: i64,
        positions: &[PositionEvent],
        clicks: &[ClickEvent],
    ) -> Result<()> {
        if !positions.is_empty() {
            let buckets: Vec<i32> = positions.iter().map(|e| e.position_bucket).collect();
            let seqs: Vec<i32> = positions.iter().map(|e| e.seq).collect();

            sqlx::query(
                "INSERT INTO ppl.impression_events (fact_id, position_bucket, seq) \
                 SELECT $1, bucket, seq FROM UNNEST($2::int4[], $3::int4[]) AS t(bucket, seq)",
            )
            .bind(fact_id)
            .bind(&buckets)
            .bind(&seqs)
            .execute(&mut *self.tx)
            .await
            .map_err(store_err)?;
        }

        if !clicks.is_empty() {
            let buckets: Vec<i32> = clicks.iter().map(|e| e.position_bucket).collect();
            let seqs: Vec<i32> = clicks.iter().map(|e| e.seq).collect();

            sqlx::query(
                "INSERT INTO ppl.click_events (fact_id, position_bucket, seq) \
                 SELECT $1, bucket, seq FROM UNNEST($2::int4[], $3::int4[]) AS t(bucket, seq)",
            )
            .bind(fact_id)
            .bind(&buckets)
            .bind(&seqs)
            .execute(&mut *self.tx)
            .await
            .map_err(store_err)?;
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(store_err)
    }
}

#[async_trait]
impl ProcessedStore for PgProcessedStore {
    async fn max_date(&self) -> Result<Option<NaiveDate>> {
        sqlx::query_scalar("SELECT MAX(date) FROM ppl.fact_aggregates")
            .fetch_one(self.client.pool())
            .await
            .map_err(store_err)
    }

    async fn count_facts(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM ppl.fact_aggregates")
            .fetch_one(self.client.pool())
            .await
            .map_err(store_err)
    }

    async fn begin(&self) -> Result<Box<dyn ProcessedTx>> {
        let tx = self.client.pool().begin().await.map_err(store_err)?;
        Ok(Box::new(PgProcessedTx { tx }))
    }

    async fn delete_all(&self) -> Result<()> {
        sqlx::query(
            "TRUNCATE ppl.click_events, ppl.impression_events, ppl.fact_aggregates \
             RESTART IDENTITY",
        )
        .execute(self.client.pool())
        .await
        .map_err(store_err)?;

        debug!("Processed layer truncated");
        Ok(())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO ppl.etl_runs \
             (run_id, mode, status, watermark_date, rows_processed, positions_created, \
              clicks_created, errors, duration_ms, started_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(run.run_id)
        .bind(run.mode.as_str())
        .bind(run.status.as_str())
        .bind(run.watermark_date)
        .bind(run.rows_processed)
        .bind(run.positions_created)
        .bind(run.clicks_created)
        .bind(run.errors)
        .bind(run.duration_ms)
        .bind(run.started_at)
        .execute(self.client.pool())
        .await
        .map_err(store_err)?;

        Ok(())
    }
}

//! Raw-layer store backed by `rdl.search_aggregates`.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::FromRow;
use tracing::debug;

use etl_core::{Error, NewRawAggregate, RawAggregate, RawStore, Result};

use crate::client::PgClient;

/// Read view plus loader-side writes over the raw aggregate table.
#[derive(Clone)]
pub struct PgRawStore {
    client: PgClient,
}

impl PgRawStore {
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, FromRow)]
struct RawRow {
    id: i64,
    date: NaiveDate,
    page_path: String,
    query: String,
    device: String,
    demand: i64,
    impressions: i64,
    clicks: i64,
    avg_position: f64,
}

impl From<RawRow> for RawAggregate {
    fn from(row: RawRow) -> Self {
        Self {
            id: row.id,
            date: row.date,
            page_path: row.page_path,
            query: row.query,
            device: row.device,
            demand: row.demand,
            impressions: row.impressions,
            clicks: row.clicks,
            position: row.avg_position,
        }
    }
}

const SELECT_COLUMNS: &str =
    "id, date, page_path, query, device, demand, impressions, clicks, avg_position";

fn store_err(e: sqlx::Error) -> Error {
    Error::store(e.to_string())
}

#[async_trait]
impl RawStore for PgRawStore {
    async fn max_date(&self) -> Result<Option<NaiveDate>> {
        sqlx::query_scalar("SELECT MAX(date) FROM rdl.search_aggregates")
            .fetch_one(self.client.pool())
            .await
            .map_err(store_err)
    }

    async fn count_all(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM rdl.search_aggregates")
            .fetch_one(self.client.pool())
            .await
            .map_err(store_err)
    }

    async fn count_since(&self, date: NaiveDate) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM rdl.search_aggregates WHERE date > $1")
            .bind(date)
            .fetch_one(self.client.pool())
            .await
            .map_err(store_err)
    }

    async fn distinct_dates_since(&self, since: Option<NaiveDate>) -> Result<Vec<NaiveDate>> {
        match since {
            Some(date) => sqlx::query_scalar(
                "SELECT DISTINCT date FROM rdl.search_aggregates WHERE date > $1 ORDER BY date",
            )
            .bind(date)
            .fetch_all(self.client.pool())
            .await
            .map_err(store_err),
            None => {
                sqlx::query_scalar("SELECT DISTINCT date FROM rdl.search_aggregates ORDER BY date")
                    .fetch_all(self.client.pool())
                    .await
                    .map_err(store_err)
            }
        }
    }

    async fn read_batch(&self, offset: i64, limit: i64) -> Result<Vec<RawAggregate>> {
        let rows: Vec<RawRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM rdl.search_aggregates ORDER BY date, id OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(self.client.pool())
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn read_date(&self, date: NaiveDate) -> Result<Vec<RawAggregate>> {
        let rows: Vec<RawRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM rdl.search_aggregates WHERE date = $1 ORDER BY id"
        ))
        .bind(date)
        .fetch_all(self.client.pool())
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_aggregates(&self, rows: &[NewRawAggregate]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.client.pool().begin().await.map_err(store_err)?;
        let mut inserted = 0u64;

        for row in rows {
            let result = sqlx::query(
                "INSERT INTO rdl.search_aggregates \
                 (date, page_path, query, device, demand, impressions, clicks, avg_position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (date, page_path, query, device) DO NOTHING",
            )
            .bind(row.date)
            .bind(&row.page_path)
            .bind(&row.query)
            .bind(&row.device)
            .bind(row.demand)
            .bind(row.impressions)
            .bind(row.clicks)
            .bind(row.position)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(store_err)?;

        debug!(
            total = rows.len(),
            inserted = inserted,
            "Inserted raw aggregates"
        );

        Ok(inserted)
    }
}

//! Store contracts consumed by the transform engine.
//!
//! The engine only ever sees these traits; Postgres implementations live
//! in the `postgres-store` crate and hermetic in-memory ones in the test
//! harness.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{
    ClickEvent, NewRawAggregate, NormalizedFact, PositionEvent, RawAggregate, RunRecord,
};

/// Read-only view over the raw aggregate layer, plus the write operations
/// used by the loader (never by the engine).
#[async_trait]
pub trait RawStore: Send + Sync {
    /// Raw-layer watermark; `None` when the layer is empty.
    async fn max_date(&self) -> Result<Option<NaiveDate>>;

    async fn count_all(&self) -> Result<i64>;

    async fn count_since(&self, date: NaiveDate) -> Result<i64>;

    /// Distinct dates strictly after `since`, ascending. All distinct
    /// dates when `since` is `None`.
    async fn distinct_dates_since(&self, since: Option<NaiveDate>) -> Result<Vec<NaiveDate>>;

    /// Stable pagination ordered by (date, id). Callers must not assume
    /// snapshot isolation across calls.
    async fn read_batch(&self, offset: i64, limit: i64) -> Result<Vec<RawAggregate>>;

    /// All rows for one date, in (date, id) order.
    async fn read_date(&self, date: NaiveDate) -> Result<Vec<RawAggregate>>;

    /// Loader-side insert with key-level dedup: rows whose
    /// (date, page_path, query, device) already exist are skipped.
    /// Returns the number actually inserted.
    async fn insert_aggregates(&self, rows: &[NewRawAggregate]) -> Result<u64>;
}

/// One open group transaction against the processed layer.
///
/// Writes become visible only on `commit`; dropping an uncommitted
/// transaction rolls everything in it back. A fact and its events are
/// therefore always both visible or both absent to outside readers.
#[async_trait]
pub trait ProcessedTx: Send {
    /// Inserts a fact and returns its surrogate id, or `None` when the
    /// (date, page_path, query, device) key already exists, meaning the
    /// row was processed by an earlier run.
    async fn insert_fact(&mut self, fact: &NormalizedFact) -> Result<Option<i64>>;

    /// Inserts the synthetic events owned by `fact_id`.
    async fn insert_events(
        &mut self,
        fact_id: i64,
        positions: &[PositionEvent],
        clicks: &[ClickEvent],
    ) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Write target for the processed layer and the run-metadata sink.
#[async_trait]
pub trait ProcessedStore: Send + Sync {
    /// Processed-layer watermark; `None` when the layer is empty.
    async fn max_date(&self) -> Result<Option<NaiveDate>>;

    async fn count_facts(&self) -> Result<i64>;

    /// Opens a group transaction. One at a time; never held across groups.
    async fn begin(&self) -> Result<Box<dyn ProcessedTx>>;

    /// Full-reload reset: deletes all facts and, by ownership, their
    /// events. Raw rows and run history are untouched.
    async fn delete_all(&self) -> Result<()>;

    /// Appends one run-metadata row. Outside any group transaction.
    async fn record_run(&self, run: &RunRecord) -> Result<()>;
}

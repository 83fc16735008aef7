//! Transform runner: watermark computation, batch iteration, per-record
//! error isolation, and per-group transactional commit.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use etl_core::expand::{expand_clicks, expand_impressions};
use etl_core::rules::normalize;
use etl_core::{
    ProcessedStore, ProcessedTx, ProcessingStatus, RawAggregate, RawStore, Result, RunMode,
    RunRecord, RunReport, RunStatus,
};
use telemetry::metrics;

use crate::status::processing_status;

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Rows per group in full-catchup mode. Incremental mode groups by
    /// date instead.
    pub batch_size: i64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Default)]
struct RunStats {
    processed: u64,
    positions: u64,
    clicks: u64,
    errors: u64,
    groups_committed: u64,
}

/// Picks the run mode from the current watermark lag. `None` means there
/// is nothing to process.
fn select_mode(status: &ProcessingStatus) -> Option<RunMode> {
    if !status.needs_processing {
        None
    } else if status.last_processed_date.is_none() {
        Some(RunMode::FullCatchup)
    } else {
        Some(RunMode::Incremental)
    }
}

/// Orchestrates one run of the raw → processed transformation.
///
/// At most one runner may be active against a given processed layer at a
/// time; that discipline belongs to the caller's scheduling, not to this
/// type.
pub struct TransformRunner<R, P> {
    raw: Arc<R>,
    processed: Arc<P>,
    config: RunnerConfig,
}

impl<R, P> TransformRunner<R, P>
where
    R: RawStore,
    P: ProcessedStore,
{
    pub fn new(raw: Arc<R>, processed: Arc<P>, config: RunnerConfig) -> Self {
        Self {
            raw,
            processed,
            config,
        }
    }

    /// Processes whatever the raw layer holds beyond the processed
    /// watermark. Skips cleanly when the layers are already in sync.
    pub async fn run_incremental(&self) -> Result<RunReport> {
        let status = processing_status(self.raw.as_ref(), self.processed.as_ref()).await?;

        match select_mode(&status) {
            None => {
                info!("No new data to process");
                self.record_skipped(RunMode::Incremental, status.last_processed_date)
                    .await;
                Ok(RunReport {
                    processed: 0,
                    positions_created: 0,
                    clicks_created: 0,
                    errors: 0,
                    status: RunStatus::Skipped,
                })
            }
            Some(mode) => self.execute(mode, &status).await,
        }
    }

    /// Destructive reset of the processed layer followed by a full
    /// catch-up. Raw rows and run history are untouched.
    pub async fn run_full_reload(&self) -> Result<RunReport> {
        warn!("Full reload requested, clearing processed layer");
        self.processed.delete_all().await?;

        let status = processing_status(self.raw.as_ref(), self.processed.as_ref()).await?;

        if !status.needs_processing {
            info!("Raw layer is empty, nothing to reload");
            self.record_skipped(RunMode::FullReload, None).await;
            return Ok(RunReport {
                processed: 0,
                positions_created: 0,
                clicks_created: 0,
                errors: 0,
                status: RunStatus::Skipped,
            });
        }

        self.execute(RunMode::FullReload, &status).await
    }

    async fn execute(&self, mode: RunMode, status: &ProcessingStatus) -> Result<RunReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut stats = RunStats::default();

        info!(
            mode = %mode,
            unprocessed = status.unprocessed_count,
            "Starting transform run"
        );

        let outcome = match mode {
            RunMode::Incremental => {
                // select_mode only picks incremental when a processed
                // watermark exists
                match status.last_processed_date {
                    Some(watermark) => self.run_date_groups(watermark, &mut stats).await,
                    None => self.run_offset_batches(status.unprocessed_count, &mut stats).await,
                }
            }
            RunMode::FullCatchup | RunMode::FullReload => {
                self.run_offset_batches(status.unprocessed_count, &mut stats).await
            }
        };

        let final_status = match outcome {
            Ok(()) => RunStatus::Success,
            Err(e) => {
                metrics().store_errors.inc();
                error!(error = %e, groups_committed = stats.groups_committed, "Run aborted");
                if stats.groups_committed > 0 {
                    RunStatus::Partial
                } else {
                    RunStatus::Failed
                }
            }
        };

        // Watermark actually reached, including after partial failure.
        let watermark = match self.processed.max_date().await {
            Ok(date) => date,
            Err(e) => {
                warn!(error = %e, "Could not read final watermark");
                None
            }
        };

        let duration_ms = start.elapsed().as_millis() as i64;
        let record = RunRecord {
            run_id: Uuid::new_v4(),
            mode,
            status: final_status,
            watermark_date: watermark,
            rows_processed: stats.processed as i64,
            positions_created: stats.positions as i64,
            clicks_created: stats.clicks as i64,
            errors: stats.errors as i64,
            duration_ms,
            started_at,
        };
        if let Err(e) = self.processed.record_run(&record).await {
            warn!(error = %e, "Failed to record run metadata");
        }

        info!(
            mode = %mode,
            status = %final_status,
            processed = stats.processed,
            positions = stats.positions,
            clicks = stats.clicks,
            errors = stats.errors,
            duration_ms = duration_ms,
            "Transform run finished"
        );
        debug!(snapshot = ?metrics().snapshot(), "Telemetry snapshot");

        Ok(RunReport {
            processed: stats.processed,
            positions_created: stats.positions,
            clicks_created: stats.clicks,
            errors: stats.errors,
            status: final_status,
        })
    }

    /// Full-catchup iteration: fixed-size batches ordered by (date, id).
    async fn run_offset_batches(&self, total: i64, stats: &mut RunStats) -> Result<()> {
        let mut offset = 0i64;

        while offset < total {
            let batch = self.raw.read_batch(offset, self.config.batch_size).await?;
            if batch.is_empty() {
                break;
            }

            let batch_len = batch.len() as i64;
            self.process_group(&batch, stats).await?;
            offset += batch_len;

            info!(processed = offset, total = total, "Committed batch");
        }

        Ok(())
    }

    /// Incremental iteration: one group per distinct date newer than the
    /// processed watermark, ascending.
    async fn run_date_groups(&self, watermark: NaiveDate, stats: &mut RunStats) -> Result<()> {
        let dates = self.raw.distinct_dates_since(Some(watermark)).await?;

        for date in dates {
            let rows = self.raw.read_date(date).await?;
            if rows.is_empty() {
                continue;
            }

            let row_count = rows.len();
            self.process_group(&rows, stats).await?;

            info!(date = %date, rows = row_count, "Committed date group");
        }

        Ok(())
    }

    /// Transforms one group inside a single transaction. Record-level
    /// failures are counted and skipped; a store failure drops the open
    /// transaction (rolling the group back) and propagates. Group
    /// counters fold into the run totals only after the commit, so a
    /// rolled-back group contributes nothing to the report.
    async fn process_group(&self, rows: &[RawAggregate], stats: &mut RunStats) -> Result<()> {
        let commit_start = Instant::now();
        let mut tx = self.processed.begin().await?;
        let mut group = RunStats::default();

        for raw in rows {
            match self.process_record(&mut *tx, raw).await {
                Ok(Some((positions, clicks))) => {
                    group.processed += 1;
                    group.positions += positions;
                    group.clicks += clicks;
                }
                Ok(None) => {
                    metrics().duplicate_facts.inc();
                }
                Err(e) if e.is_record_level() => {
                    group.errors += 1;
                    metrics().record_errors.inc();
                    warn!(id = raw.id, error = %e, "Skipping record");
                }
                Err(e) => return Err(e),
            }
        }

        tx.commit().await?;

        stats.processed += group.processed;
        stats.positions += group.positions;
        stats.clicks += group.clicks;
        stats.errors += group.errors;
        stats.groups_committed += 1;

        metrics()
            .group_commit_latency_ms
            .observe(commit_start.elapsed().as_millis() as u64);
        metrics().groups_committed.inc();
        metrics().rows_processed.inc_by(rows.len() as u64);
        metrics().facts_inserted.inc_by(group.processed);
        metrics().positions_created.inc_by(group.positions);
        metrics().clicks_created.inc_by(group.clicks);

        Ok(())
    }

    /// Normalizes and expands one raw row into the open transaction.
    /// Returns the event counts, or `None` when the fact already exists.
    async fn process_record(
        &self,
        tx: &mut dyn ProcessedTx,
        raw: &RawAggregate,
    ) -> Result<Option<(u64, u64)>> {
        let fact = normalize(raw)?;

        let Some(fact_id) = tx.insert_fact(&fact).await? else {
            debug!(key = %fact.key(), "Fact already processed, skipping");
            return Ok(None);
        };

        let positions = expand_impressions(&fact);
        let clicks = expand_clicks(&fact);
        tx.insert_events(fact_id, &positions, &clicks).await?;

        Ok(Some((positions.len() as u64, clicks.len() as u64)))
    }

    async fn record_skipped(&self, mode: RunMode, watermark: Option<NaiveDate>) {
        let record = RunRecord {
            run_id: Uuid::new_v4(),
            mode,
            status: RunStatus::Skipped,
            watermark_date: watermark,
            rows_processed: 0,
            positions_created: 0,
            clicks_created: 0,
            errors: 0,
            duration_ms: 0,
            started_at: Utc::now(),
        };
        if let Err(e) = self.processed.record_run(&record).await {
            warn!(error = %e, "Failed to record skipped run");
        }
    }
}

//! Loader staging fetched aggregates into the raw layer.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use etl_core::{NewRawAggregate, RawStore, Result};
use telemetry::metrics;

use crate::client::{DeviceType, ReportsClient};
use crate::dates::DateGapFinder;

/// Outcome of loading a single date.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub date: NaiveDate,
    pub fetched: usize,
    pub inserted: u64,
}

/// Outcome of a missing-dates sweep.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub dates_loaded: usize,
    pub dates_failed: usize,
    pub rows_inserted: u64,
}

/// Fetches per-(url, device) statistics and stages them append-only.
pub struct RawLoader<R> {
    client: Arc<ReportsClient>,
    raw: Arc<R>,
}

impl<R: RawStore> RawLoader<R> {
    pub fn new(client: Arc<ReportsClient>, raw: Arc<R>) -> Self {
        Self { client, raw }
    }

    /// Loads all aggregates for one date.
    ///
    /// Rows without demand are dropped before insert. A fetch failure for
    /// one (url, device) cell is logged and skipped; the rest of the date
    /// still loads. Rows whose key already exists are deduped by the
    /// store.
    pub async fn load_date(&self, date: NaiveDate) -> Result<LoadReport> {
        let urls = self.client.urls_for_date(date).await?;
        if urls.is_empty() {
            info!(date = %date, "No pages with impressions");
            return Ok(LoadReport {
                date,
                fetched: 0,
                inserted: 0,
            });
        }

        let mut rows: Vec<NewRawAggregate> = Vec::new();
        for url in &urls {
            for device in DeviceType::ALL {
                match self.client.stats_for_url(date, url, device).await {
                    Ok(batch) => rows.extend(batch.into_iter().filter(|r| r.demand > 0)),
                    Err(e) => {
                        warn!(
                            date = %date,
                            url = %url,
                            device = device.api_value(),
                            error = %e,
                            "Fetch failed, skipping cell"
                        );
                    }
                }
            }
        }

        let fetched = rows.len();
        let inserted = self.raw.insert_aggregates(&rows).await?;
        metrics().rows_loaded.inc_by(inserted);

        info!(date = %date, fetched = fetched, inserted = inserted, "Loaded date");

        Ok(LoadReport {
            date,
            fetched,
            inserted,
        })
    }

    /// Discovers missing dates within the lookback window and loads each.
    /// A failed date is counted and skipped; later dates still load.
    pub async fn load_missing(&self, days_back: u32) -> Result<LoadSummary> {
        let finder = DateGapFinder::new(self.client.clone(), self.raw.clone(), days_back);
        let missing = finder.missing_dates().await?;

        if missing.is_empty() {
            info!("All recent dates already loaded");
            return Ok(LoadSummary::default());
        }

        let mut summary = LoadSummary::default();
        let total = missing.len();

        for (i, date) in missing.into_iter().enumerate() {
            info!(date = %date, step = i + 1, total = total, "Loading missing date");
            match self.load_date(date).await {
                Ok(report) => {
                    summary.dates_loaded += 1;
                    summary.rows_inserted += report.inserted;
                }
                Err(e) => {
                    summary.dates_failed += 1;
                    warn!(date = %date, error = %e, "Date load failed");
                }
            }
        }

        info!(
            dates_loaded = summary.dates_loaded,
            dates_failed = summary.dates_failed,
            rows_inserted = summary.rows_inserted,
            "Missing-date sweep finished"
        );

        Ok(summary)
    }
}

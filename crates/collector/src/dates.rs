//! Date-gap discovery between the reporting API and the raw layer.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use tracing::{info, warn};

use etl_core::{RawStore, Result};

use crate::client::ReportsClient;

/// The lookback window ending at `today`, ascending.
fn window_dates(today: NaiveDate, days_back: u32) -> Vec<NaiveDate> {
    let span = days_back.max(1);
    let start = today
        .checked_sub_days(Days::new(span as u64 - 1))
        .unwrap_or(today);

    start.iter_days().take(span as usize).collect()
}

/// Finds recent dates the API has data for that the raw layer is missing.
pub struct DateGapFinder<R> {
    client: Arc<ReportsClient>,
    raw: Arc<R>,
    days_back: u32,
}

impl<R: RawStore> DateGapFinder<R> {
    pub fn new(client: Arc<ReportsClient>, raw: Arc<R>, days_back: u32) -> Self {
        Self {
            client,
            raw,
            days_back,
        }
    }

    /// Dates within the lookback window that need loading, ascending.
    ///
    /// Dates already present in the raw layer are skipped without an API
    /// call; an API probe failure skips just that date.
    pub async fn missing_dates(&self) -> Result<Vec<NaiveDate>> {
        let existing: HashSet<NaiveDate> = self
            .raw
            .distinct_dates_since(None)
            .await?
            .into_iter()
            .collect();

        let window = window_dates(Utc::now().date_naive(), self.days_back);
        let mut missing = Vec::new();

        for date in window {
            if existing.contains(&date) {
                continue;
            }
            match self.client.date_has_data(date).await {
                Ok(true) => missing.push(date),
                Ok(false) => {}
                Err(e) => warn!(date = %date, error = %e, "Date probe failed, skipping"),
            }
        }

        info!(
            window_days = self.days_back,
            loaded = existing.len(),
            missing = missing.len(),
            "Date gap discovery finished"
        );

        Ok(missing)
    }
}

//! Domain types for the raw and processed layers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One raw aggregate row as loaded from the reporting API.
///
/// Keyed uniquely by (date, page_path, query, device); append-only,
/// written by the collector and only ever read by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAggregate {
    pub id: i64,
    pub date: NaiveDate,
    pub page_path: String,
    pub query: String,
    pub device: String,
    pub demand: i64,
    pub impressions: i64,
    pub clicks: i64,
    pub position: f64,
}

impl RawAggregate {
    /// Human-readable key for log and error messages.
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.date, self.device, self.page_path, self.query
        )
    }
}

/// A raw row about to be inserted by the loader (no id assigned yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRawAggregate {
    pub date: NaiveDate,
    pub page_path: String,
    pub query: String,
    pub device: String,
    pub demand: i64,
    pub impressions: i64,
    pub clicks: i64,
    pub position: f64,
}

/// Normalized fact for the processed layer, carrying the clamped counts.
///
/// The surrogate id is assigned by the store at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFact {
    pub date: NaiveDate,
    pub page_path: String,
    pub query: String,
    pub device: String,
    pub demand: i64,
    /// `min(raw.impressions, raw.demand)`
    pub impressions: i64,
    /// `min(raw.clicks, clamped impressions)`
    pub clicks: i64,
    pub position: f64,
}

impl NormalizedFact {
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.date, self.device, self.page_path, self.query
        )
    }
}

/// Synthetic impression event. One row per clamped impression; `seq` is
/// 1-based and contiguous within the owning fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEvent {
    pub position_bucket: i32,
    pub seq: i32,
}

/// Synthetic click event, same shape and ownership as [`PositionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub position_bucket: i32,
    pub seq: i32,
}

/// How a run selects its input rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Only dates newer than the processed watermark, one group per date.
    Incremental,
    /// The processed layer is empty: all raw rows, in offset batches.
    FullCatchup,
    /// Explicit destructive reset followed by the full-catchup path.
    FullReload,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::FullCatchup => "full_catchup",
            Self::FullReload => "full_reload",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing to process.
    Skipped,
    /// All groups committed. Per-record errors may still be counted.
    Success,
    /// A store failure ended the run after at least one committed group;
    /// that progress is retained.
    Partial,
    /// A store failure ended the run before anything was committed.
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watermark lag between the raw and processed layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub last_raw_date: Option<NaiveDate>,
    pub last_processed_date: Option<NaiveDate>,
    pub unprocessed_count: i64,
    pub needs_processing: bool,
}

/// What a run returns to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub processed: u64,
    pub positions_created: u64,
    pub clicks_created: u64,
    pub errors: u64,
    pub status: RunStatus,
}

/// Audit row recorded for every run, including skipped and failed ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub status: RunStatus,
    /// Processed-layer watermark reached by this run.
    pub watermark_date: Option<NaiveDate>,
    pub rows_processed: i64,
    pub positions_created: i64,
    pub clicks_created: i64,
    pub errors: i64,
    pub duration_ms: i64,
    pub started_at: DateTime<Utc>,
}

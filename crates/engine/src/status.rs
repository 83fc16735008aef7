//! Watermark comparison between the raw and processed layers.

use etl_core::{ProcessedStore, ProcessingStatus, RawStore, Result};
use telemetry::metrics;

/// Computes the current lag between the two layers.
///
/// The processed layer is behind when it is empty and raw rows exist, or
/// when the raw watermark is newer than the processed one. Used both by
/// the runner (mode selection) and by the status CLI.
pub async fn processing_status<R, P>(raw: &R, processed: &P) -> Result<ProcessingStatus>
where
    R: RawStore + ?Sized,
    P: ProcessedStore + ?Sized,
{
    let last_raw_date = raw.max_date().await?;
    let last_processed_date = processed.max_date().await?;

    let (unprocessed_count, needs_processing) = match (last_processed_date, last_raw_date) {
        (None, _) => {
            let count = raw.count_all().await?;
            (count, count > 0)
        }
        (Some(processed_mark), Some(raw_mark)) if raw_mark > processed_mark => {
            (raw.count_since(processed_mark).await?, true)
        }
        _ => (0, false),
    };

    if let (Some(raw_mark), Some(processed_mark)) = (last_raw_date, last_processed_date) {
        let lag = (raw_mark - processed_mark).num_days().max(0) as u64;
        metrics().watermark_lag_days.set(lag);
    }

    Ok(ProcessingStatus {
        last_raw_date,
        last_processed_date,
        unprocessed_count,
        needs_processing,
    })
}

//! Business rules mapping a raw aggregate to a normalized fact.

use crate::error::{Error, Result};
use crate::model::{NormalizedFact, RawAggregate};

/// Normalizes one raw aggregate. Pure: no side effects, no I/O.
///
/// Clamps impressions to demand and clicks to the clamped impressions.
/// Rejects malformed input (negative counts, non-finite position) with
/// [`Error::InvalidRecord`], which the runner treats as a per-record
/// failure rather than a batch abort.
pub fn normalize(raw: &RawAggregate) -> Result<NormalizedFact> {
    if raw.demand < 0 {
        return Err(Error::invalid_record(raw.key(), "negative demand"));
    }
    if raw.impressions < 0 {
        return Err(Error::invalid_record(raw.key(), "negative impressions"));
    }
    if raw.clicks < 0 {
        return Err(Error::invalid_record(raw.key(), "negative clicks"));
    }
    if !raw.position.is_finite() || raw.position < 0.0 {
        return Err(Error::invalid_record(raw.key(), "invalid position"));
    }

    let impressions = raw.impressions.min(raw.demand);
    let clicks = raw.clicks.min(impressions);

    Ok(NormalizedFact {
        date: raw.date,
        page_path: raw.page_path.clone(),
        query: raw.query.clone(),
        device: raw.device.clone(),
        demand: raw.demand,
        impressions,
        clicks,
        position: raw.position,
    })
}

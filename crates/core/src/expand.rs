//! Deterministic expansion of clamped counts into synthetic event rows.
//!
//! Aggregates only carry an average position, so per-event positions are
//! reconstructed from a fixed distribution around the rounded-down average:
//! impressions land 70% on `base`, 15% one rank better, 15% one rank worse;
//! clicks land 80% on `base` and 20% one rank better. Assignment is purely
//! index-based so the same fact always expands to the same rows.

use crate::model::{ClickEvent, NormalizedFact, PositionEvent};

/// Exact threshold test: index `i` falls below the `pct`% cutoff of `n`.
///
/// Equivalent to `i < n * (pct / 100)` evaluated in rationals. The
/// denominator is the fact's clamped count, fixed for every index, so
/// boundaries cannot drift the way repeated float multiplication can.
fn below(i: i64, pct: u64, n: i64) -> bool {
    (i as u64) * 100 < pct * (n as u64)
}

/// Rounded-down average position, floored at rank 1.
fn base_bucket(fact: &NormalizedFact) -> i32 {
    (fact.position.floor() as i64).max(1) as i32
}

/// Expands a fact's clamped impression count into ordered position events.
///
/// Returns exactly `fact.impressions` events with contiguous 1-based
/// sequence indices.
pub fn expand_impressions(fact: &NormalizedFact) -> Vec<PositionEvent> {
    let n = fact.impressions;
    if n <= 0 {
        return Vec::new();
    }

    let base = base_bucket(fact);
    (0..n)
        .map(|i| {
            let position_bucket = if below(i, 70, n) {
                base
            } else if below(i, 85, n) {
                (base - 1).max(1)
            } else {
                (base + 1).min(10)
            };
            PositionEvent {
                position_bucket,
                seq: (i + 1) as i32,
            }
        })
        .collect()
}

/// Expands a fact's clamped click count into ordered click events.
///
/// Returns exactly `fact.clicks` events with contiguous 1-based sequence
/// indices.
pub fn expand_clicks(fact: &NormalizedFact) -> Vec<ClickEvent> {
    let n = fact.clicks;
    if n <= 0 {
        return Vec::new();
    }

    let base = base_bucket(fact);
    (0..n)
        .map(|i| {
            let position_bucket = if below(i, 80, n) {
                base
            } else {
                (base - 1).max(1)
            };
            ClickEvent {
                position_bucket,
                seq: (i + 1) as i32,
            }
        })
        .collect()
}

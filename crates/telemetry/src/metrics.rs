//! Internal metrics collection.
//!
//! Counters accumulate over a process lifetime; the runner snapshots them
//! into structured logs when a run finalizes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }
}

/// Collected metrics for the ETL process.
#[derive(Debug, Default)]
pub struct Metrics {
    // Transform metrics
    pub rows_processed: Counter,
    pub facts_inserted: Counter,
    pub duplicate_facts: Counter,
    pub record_errors: Counter,
    pub positions_created: Counter,
    pub clicks_created: Counter,
    pub groups_committed: Counter,
    pub store_errors: Counter,

    // Collector metrics
    pub api_requests: Counter,
    pub api_errors: Counter,
    pub rows_loaded: Counter,

    // Latency histograms
    pub group_commit_latency_ms: Histogram,
    pub api_latency_ms: Histogram,

    // Gauges
    pub watermark_lag_days: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub rows_processed: u64,
    pub facts_inserted: u64,
    pub duplicate_facts: u64,
    pub record_errors: u64,
    pub positions_created: u64,
    pub clicks_created: u64,
    pub groups_committed: u64,
    pub store_errors: u64,
    pub api_requests: u64,
    pub api_errors: u64,
    pub rows_loaded: u64,
    pub group_commit_latency_mean_ms: f64,
    pub api_latency_mean_ms: f64,
    pub watermark_lag_days: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            rows_processed: self.rows_processed.get(),
            facts_inserted: self.facts_inserted.get(),
            duplicate_facts: self.duplicate_facts.get(),
            record_errors: self.record_errors.get(),
            positions_created: self.positions_created.get(),
            clicks_created: self.clicks_created.get(),
            groups_committed: self.groups_committed.get(),
            store_errors: self.store_errors.get(),
            api_requests: self.api_requests.get(),
            api_errors: self.api_errors.get(),
            rows_loaded: self.rows_loaded.get(),
            group_commit_latency_mean_ms: self.group_commit_latency_ms.mean(),
            api_latency_mean_ms: self.api_latency_ms.mean(),
            watermark_lag_days: self.watermark_lag_days.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}

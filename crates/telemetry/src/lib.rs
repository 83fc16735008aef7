//! Internal telemetry for the search ETL.
//!
//! In-process counters only; runs are short-lived, so metrics surface
//! through the run-metadata table and structured logs rather than an
//! external metrics system.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;

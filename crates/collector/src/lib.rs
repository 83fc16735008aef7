//! Collector for the raw layer: reporting-API client, date-gap
//! discovery, and the loader that stages fetched aggregates.

pub mod client;
pub mod config;
pub mod dates;
pub mod loader;

pub use client::{DeviceType, ReportsClient};
pub use config::CollectorConfig;
pub use dates::DateGapFinder;
pub use loader::{LoadReport, LoadSummary, RawLoader};

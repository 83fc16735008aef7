//! Postgres implementations of the raw and processed store contracts.

pub mod client;
pub mod config;
pub mod health;
pub mod processed;
pub mod raw;
pub mod schema;

pub use client::PgClient;
pub use config::PostgresConfig;
pub use processed::PgProcessedStore;
pub use raw::PgRawStore;

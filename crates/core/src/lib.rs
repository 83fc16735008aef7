//! Core types, business rules, and store contracts for the search ETL.

pub mod error;
pub mod expand;
pub mod model;
pub mod rules;
pub mod store;

pub use error::{Error, Result};
pub use model::*;
pub use store::{ProcessedStore, ProcessedTx, RawStore};

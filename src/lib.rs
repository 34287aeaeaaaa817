//! Batch ETL for the Johns Hopkins CSSE COVID-19 time series.
//!
//! Fetch the wide confirmed/deaths CSVs, reshape them to one long table keyed
//! by location and date, fill every gap, then write the result to a CSV file
//! and a Postgres table. Each stage is exposed in [`pipeline`] and runs once,
//! sequentially.

pub mod config;
pub mod error;
pub mod fetch;
pub mod fill;
pub mod logging;
pub mod persist;
pub mod pipeline;
pub mod raw;
pub mod reshape;
pub mod table;

pub use config::Config;
pub use error::{EtlError, Result};

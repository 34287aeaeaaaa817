//! Loader-of-raw: pick the newest fetched file for a resource and parse it.

pub mod latest;
pub mod wide;

pub use latest::{find_latest, list_raw_files, RawFile};
pub use wide::{WideRow, WideTable};

use crate::error::Result;
use crate::table::Metric;
use std::path::Path;

/// Load the most recently fetched wide table for `prefix`.
pub fn load_latest(dir: &Path, prefix: &str, metric: Metric) -> Result<WideTable> {
    let file = find_latest(dir, prefix)?;
    WideTable::read(&file.path, metric)
}

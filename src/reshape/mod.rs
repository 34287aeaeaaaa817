//! Reshaper: wide tables in, one merged long table out.

pub mod aggregate;
pub mod date_parser;
pub mod melt;
pub mod merge;

pub use aggregate::aggregate;
pub use melt::melt;
pub use merge::merge_metrics;

use crate::error::{EtlError, Result};
use crate::raw::WideTable;
use crate::table::{Country, Location, MergedTable, Metric};
use tracing::{info, instrument, warn};

/// Melt both wide tables and outer-join them on (location, date).
#[instrument(level = "info", skip_all)]
pub fn reshape_and_merge(
    confirmed: &WideTable,
    deaths: &WideTable,
) -> Result<MergedTable<Location>> {
    for (table, expected) in [(confirmed, Metric::Confirmed), (deaths, Metric::Deaths)] {
        if table.metric != expected {
            return Err(EtlError::Schema(format!(
                "expected a {expected} table, got {}",
                table.metric
            )));
        }
    }
    if confirmed.date_headers != deaths.date_headers {
        warn!(
            confirmed = confirmed.date_headers.len(),
            deaths = deaths.date_headers.len(),
            "date columns differ between metrics; unmatched dates stay missing"
        );
    }

    let merged = merge_metrics(melt(confirmed)?, melt(deaths)?)?;
    info!(rows = merged.len(), "reshaped");
    Ok(merged)
}

/// Collapse province rows into one row per country and date.
pub fn aggregate_by_country(table: &MergedTable<Location>) -> MergedTable<Country> {
    aggregate(table, |loc| Country::from(loc))
}

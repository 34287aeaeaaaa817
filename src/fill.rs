//! Gap-filler: one row per location per day, no missing counts.

use crate::error::{EtlError, Result};
use crate::table::{CompleteRow, CompleteTable, LocationKey, MergedTable, MetricPair};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::{info, instrument};

/// Largest count the SQL sink can store (`BIGINT`).
const MAX_COUNT: f64 = i64::MAX as f64;

/// Truncate toward zero; negative, non-finite or out-of-range counts are rejected.
fn to_count<K: LocationKey>(key: &K, date: NaiveDate, value: f64) -> Result<u64> {
    if !value.is_finite() || value < 0.0 || value >= MAX_COUNT {
        return Err(EtlError::InvalidCount {
            key: key.to_string(),
            date,
            value,
        });
    }
    Ok(value.trunc() as u64)
}

/// Expand `table` to every (location, day) in the global date range.
///
/// Missing values take the latest earlier value of the same location and
/// metric; values before a location's first observation become zero.
#[instrument(level = "info", skip_all, fields(rows_in = table.len()))]
pub fn fill_gaps<K: LocationKey>(table: &MergedTable<K>) -> Result<CompleteTable<K>> {
    let Some((first, last)) = table.date_range() else {
        return Ok(CompleteTable { rows: Vec::new() });
    };
    let days: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= last).collect();
    let locations: BTreeSet<&K> = table.rows.keys().map(|(k, _)| k).collect();

    let mut rows = Vec::with_capacity(locations.len() * days.len());
    for key in locations {
        let mut carried = MetricPair::default();
        for &date in &days {
            if let Some(seen) = table.rows.get(&(key.clone(), date)) {
                carried.confirmed = seen.confirmed.or(carried.confirmed);
                carried.deaths = seen.deaths.or(carried.deaths);
            }
            rows.push(CompleteRow {
                key: key.clone(),
                date,
                confirmed: to_count(key, date, carried.confirmed.unwrap_or(0.0))?,
                deaths: to_count(key, date, carried.deaths.unwrap_or(0.0))?,
            });
        }
    }

    info!(
        rows = rows.len(),
        days = days.len(),
        from = %first,
        to = %last,
        "gap-filled"
    );
    Ok(CompleteTable { rows })
}

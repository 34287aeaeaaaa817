use crate::error::{EtlError, Result};
use crate::table::{LocationKey, LongTable, MergedTable};
use tracing::debug;

/// Outer-join two long tables of different metrics on (location, date).
///
/// Each side lands in the column named by its own metric, so argument order
/// does not matter. Pairs present on one side only keep `None` for the other.
pub fn merge_metrics<K: LocationKey>(a: LongTable<K>, b: LongTable<K>) -> Result<MergedTable<K>> {
    if a.metric == b.metric {
        return Err(EtlError::Schema(format!(
            "cannot merge two {} tables",
            a.metric
        )));
    }

    let mut merged = MergedTable::default();
    for side in [a, b] {
        let metric = side.metric;
        for (key, value) in side.values {
            merged.rows.entry(key).or_default().set(metric, value);
        }
    }
    debug!(rows = merged.len(), "merged");
    Ok(merged)
}

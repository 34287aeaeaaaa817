use crate::table::{LocationKey, MergedTable, MetricPair};
use tracing::debug;

fn add(acc: Option<f64>, v: Option<f64>) -> Option<f64> {
    match (acc, v) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

/// Re-key every row with `group` and sum both metrics per (group, date).
/// A sum stays missing only when every contributing value is missing.
pub fn aggregate<K, G, F>(table: &MergedTable<K>, group: F) -> MergedTable<G>
where
    K: LocationKey,
    G: LocationKey,
    F: Fn(&K) -> G,
{
    let mut out = MergedTable::<G>::default();
    for ((key, date), pair) in &table.rows {
        let acc: &mut MetricPair = out.rows.entry((group(key), *date)).or_default();
        acc.confirmed = add(acc.confirmed, pair.confirmed);
        acc.deaths = add(acc.deaths, pair.deaths);
    }
    debug!(from = table.len(), to = out.len(), "aggregated");
    out
}

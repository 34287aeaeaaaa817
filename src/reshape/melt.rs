use super::date_parser::parse_date_header;
use crate::error::{EtlError, Result};
use crate::raw::WideTable;
use crate::table::{Location, LongTable};
use chrono::NaiveDate;
use std::collections::btree_map::Entry;
use tracing::debug;

/// Unpivot a wide table: one value per (location, date column).
pub fn melt(wide: &WideTable) -> Result<LongTable<Location>> {
    let dates = wide
        .date_headers
        .iter()
        .map(|h| parse_date_header(h))
        .collect::<Result<Vec<NaiveDate>>>()?;

    let mut long = LongTable::new(wide.metric);
    for row in &wide.rows {
        for (date, value) in dates.iter().zip(&row.cells) {
            match long.values.entry((row.location.clone(), *date)) {
                Entry::Vacant(slot) => {
                    slot.insert(*value);
                }
                Entry::Occupied(_) => {
                    return Err(EtlError::DuplicateKey {
                        key: row.location.to_string(),
                        date: *date,
                    })
                }
            }
        }
    }
    debug!(metric = %wide.metric, rows = long.len(), "melted");
    Ok(long)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Metric;
    use std::path::Path;

    fn wide(text: &str) -> WideTable {
        WideTable::from_reader(text.as_bytes(), Metric::Deaths, Path::new("t.csv")).unwrap()
    }

    #[test]
    fn row_count_is_locations_times_dates() {
        let w = wide(
            "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20\n\
             ,A,1,1,0,1,2\n\
             P,B,2,2,3,4,5\n",
        );
        let long = melt(&w).unwrap();
        assert_eq!(long.metric, Metric::Deaths);
        assert_eq!(long.len(), 2 * 3);

        let (key, value) = long.values.iter().last().unwrap();
        assert_eq!(key.0.province.as_deref(), Some("P"));
        assert_eq!(key.1, NaiveDate::from_ymd_opt(2020, 1, 24).unwrap());
        assert_eq!(*value, Some(5.0));
    }

    #[test]
    fn blank_cells_stay_missing() {
        let long = melt(&wide("Country/Region,1/22/20,1/23/20\nA,,7\n")).unwrap();
        let values: Vec<_> = long.values.values().copied().collect();
        assert_eq!(values, vec![None, Some(7.0)]);
    }

    #[test]
    fn bad_date_header_is_date_parse_error() {
        let err = melt(&wide("Country/Region,Lat,Long,Jan 22\nA,1,1,0\n")).unwrap_err();
        assert!(matches!(err, EtlError::DateParse { .. }));
    }

    #[test]
    fn repeated_location_is_rejected() {
        let err = melt(&wide("Country/Region,1/22/20\nA,1\nA,2\n")).unwrap_err();
        assert!(matches!(err, EtlError::DuplicateKey { ref key, .. } if key == "A"));
    }
}

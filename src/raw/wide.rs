use crate::error::{EtlError, Result};
use crate::table::{
    non_empty, parse_optional_f64, Location, Metric, COUNTRY_COLUMN, LAT_COLUMN, LONG_COLUMN,
    PROVINCE_COLUMN,
};
use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, instrument};

/// Positions of the identifier columns in a wide file's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdColumns {
    pub province: Option<usize>,
    pub country: usize,
    pub lat: Option<usize>,
    pub long: Option<usize>,
}

impl IdColumns {
    fn locate(headers: &[String]) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let country = find(COUNTRY_COLUMN)
            .ok_or_else(|| EtlError::Schema(format!("missing `{COUNTRY_COLUMN}` column")))?;
        Ok(IdColumns {
            province: find(PROVINCE_COLUMN),
            country,
            lat: find(LAT_COLUMN),
            long: find(LONG_COLUMN),
        })
    }

    fn contains(&self, idx: usize) -> bool {
        idx == self.country
            || self.province == Some(idx)
            || self.lat == Some(idx)
            || self.long == Some(idx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub location: Location,
    /// One cell per entry of [`WideTable::date_headers`]; blank cells are `None`.
    pub cells: Vec<Option<f64>>,
}

/// One metric in wide form: a row per location, a column per date.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub metric: Metric,
    pub id_columns: IdColumns,
    /// Raw date headers, in file order, still unparsed.
    pub date_headers: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    /// Read a wide CSV file.
    #[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
    pub fn read(path: impl AsRef<Path>, metric: Metric) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
        Self::from_reader(file, metric, path)
    }

    /// Parse wide CSV text from any reader; `origin` is only used in errors.
    pub fn from_reader<R: Read>(reader: R, metric: Metric, origin: &Path) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| EtlError::csv(origin, e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let id_columns = IdColumns::locate(&headers)?;
        let date_idx: Vec<usize> = (0..headers.len())
            .filter(|i| !id_columns.contains(*i))
            .collect();
        let date_headers = date_idx.iter().map(|&i| headers[i].clone()).collect();

        let mut rows = Vec::new();
        for (n, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| EtlError::csv(origin, e))?;
            let field = |i: usize| record.get(i).unwrap_or("");
            let bad_cell = |col: usize, reason: String| {
                EtlError::Schema(format!(
                    "{}: record {}, column `{}`: {}",
                    origin.display(),
                    n + 1,
                    headers[col],
                    reason
                ))
            };
            let coord = |idx: Option<usize>| -> Result<Option<f64>> {
                match idx {
                    Some(i) => parse_optional_f64(field(i)).map_err(|r| bad_cell(i, r)),
                    None => Ok(None),
                }
            };

            let country = non_empty(field(id_columns.country))
                .ok_or_else(|| bad_cell(id_columns.country, "empty country".into()))?;
            let location = Location {
                province: id_columns
                    .province
                    .and_then(|i| non_empty(field(i)))
                    .map(str::to_string),
                country: country.to_string(),
                lat: coord(id_columns.lat)?,
                long: coord(id_columns.long)?,
            };
            let cells = date_idx
                .iter()
                .map(|&i| parse_optional_f64(field(i)).map_err(|r| bad_cell(i, r)))
                .collect::<Result<Vec<_>>>()?;
            rows.push(WideRow { location, cells });
        }

        debug!(
            rows = rows.len(),
            dates = date_idx.len(),
            %metric,
            "parsed wide table"
        );
        Ok(WideTable {
            metric,
            id_columns,
            date_headers,
            rows,
        })
    }
}

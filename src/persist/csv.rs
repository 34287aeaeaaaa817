use crate::error::{EtlError, Result};
use crate::table::{CompleteRow, CompleteTable, KeyValue, LocationKey, DATE_COLUMN};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use std::{
    fs::{self, File},
    path::Path,
};
use tracing::{info, instrument};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Header of the processed file: key columns, then date and both counts.
pub fn header<K: LocationKey>() -> Vec<&'static str> {
    K::COLUMNS
        .iter()
        .map(|c| c.name)
        .chain([DATE_COLUMN, "Confirmed", "Deaths"])
        .collect()
}

fn key_field(v: KeyValue<'_>) -> String {
    match v {
        KeyValue::Text(s) => s.unwrap_or_default().to_string(),
        KeyValue::Float(f) => f.map(|f| f.to_string()).unwrap_or_default(),
    }
}

/// Write `table` to `path`, replacing any existing file.
///
/// Rows go to a hidden temp file next to `path` first, then get renamed over
/// it, so readers never see a half-written table.
#[instrument(level = "info", skip(table, path), fields(path = %path.display()))]
pub fn write_csv<K: LocationKey>(table: &CompleteTable<K>, path: &Path) -> Result<()> {
    let target = path.display().to_string();
    let err = |e: &dyn std::fmt::Display| EtlError::persist(&target, e);

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).map_err(|e| err(&format!("creating {}: {e}", dir.display())))?;
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| err(&"path has no file name"))?
        .to_string_lossy();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let written = write_rows(table, &tmp_path)
        .and_then(|()| fs::rename(&tmp_path, path).map_err(csv::Error::from));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(err(&e));
    }

    info!(rows = table.len(), "wrote processed CSV");
    Ok(())
}

fn write_rows<K: LocationKey>(table: &CompleteTable<K>, tmp_path: &Path) -> csv::Result<()> {
    let mut wtr = WriterBuilder::new().from_path(tmp_path)?;
    wtr.write_record(header::<K>())?;
    for row in &table.rows {
        let mut record: Vec<String> = row.key.values().into_iter().map(key_field).collect();
        record.push(row.date.format(DATE_FORMAT).to_string());
        record.push(row.confirmed.to_string());
        record.push(row.deaths.to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a processed CSV back, checking the header matches `K`.
#[instrument(level = "info", skip(path), fields(path = %path.display()))]
pub fn read_csv<K: LocationKey>(path: &Path) -> Result<CompleteTable<K>> {
    let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let expected = header::<K>();
    let found: Vec<String> = rdr
        .headers()
        .map_err(|e| EtlError::csv(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if found != expected {
        return Err(EtlError::Schema(format!(
            "{}: header {:?}, expected {:?}",
            path.display(),
            found,
            expected
        )));
    }

    let n_key = K::COLUMNS.len();
    let mut rows = Vec::new();
    for (n, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| EtlError::csv(path, e))?;
        let bad = |reason: String| {
            EtlError::Schema(format!("{}: record {}: {}", path.display(), n + 1, reason))
        };
        let fields: Vec<&str> = record.iter().collect();
        let key = K::from_fields(&fields[..n_key]).map_err(bad)?;
        let date = NaiveDate::parse_from_str(fields[n_key], DATE_FORMAT)
            .map_err(|e| bad(format!("date {:?}: {e}", fields[n_key])))?;
        let count = |i: usize| {
            fields[i]
                .parse::<u64>()
                .map_err(|e| bad(format!("count {:?}: {e}", fields[i])))
        };
        rows.push(CompleteRow {
            key,
            date,
            confirmed: count(n_key + 1)?,
            deaths: count(n_key + 2)?,
        });
    }
    rows.sort_by(|a, b| (&a.key, a.date).cmp(&(&b.key, b.date)));
    Ok(CompleteTable { rows })
}

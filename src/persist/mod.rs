//! Persister: processed CSV (plus optional Parquet copy) and the SQL table.

pub mod csv;
pub mod parquet;
pub mod postgres;

pub use self::csv::{read_csv, write_csv};
pub use self::parquet::write_parquet;
pub use self::postgres::replace_table;

use crate::error::{EtlError, Result};
use crate::table::{CompleteRow, KeyKind, KeyValue, LocationKey};

/// Key columns of a table pulled out column-wise, ready for Arrow or SQL arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Float(Vec<Option<f64>>),
}

pub fn key_columns<K: LocationKey>(rows: &[CompleteRow<K>]) -> Result<Vec<ColumnData>> {
    let n = rows.len();
    let mut cols: Vec<ColumnData> = K::COLUMNS
        .iter()
        .map(|c| match c.kind {
            KeyKind::Text => ColumnData::Text(Vec::with_capacity(n)),
            KeyKind::Float => ColumnData::Float(Vec::with_capacity(n)),
        })
        .collect();

    for row in rows {
        let values = row.key.values();
        if values.len() != cols.len() {
            return Err(EtlError::Schema(format!(
                "key {} has {} fields, expected {}",
                row.key,
                values.len(),
                cols.len()
            )));
        }
        for ((col, value), column) in cols.iter_mut().zip(values).zip(K::COLUMNS) {
            match (col, value) {
                (ColumnData::Text(v), KeyValue::Text(s)) => v.push(s.map(str::to_string)),
                (ColumnData::Float(v), KeyValue::Float(f)) => v.push(f),
                _ => {
                    return Err(EtlError::Schema(format!(
                        "key {} has wrong type for column `{}`",
                        row.key, column.name
                    )))
                }
            }
        }
    }
    Ok(cols)
}

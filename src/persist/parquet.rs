use super::{key_columns, ColumnData};
use crate::error::{EtlError, Result};
use crate::table::{CompleteTable, KeyKind, LocationKey, DATE_COLUMN};
use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, StringArray, UInt64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::Datelike;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{fs, fs::File, path::Path, sync::Arc};
use tracing::{info, instrument};

/// `num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Arrow schema for a complete table keyed by `K`.
pub fn arrow_schema<K: LocationKey>() -> Schema {
    let mut fields: Vec<Field> = K::COLUMNS
        .iter()
        .map(|c| {
            let dt = match c.kind {
                KeyKind::Text => DataType::Utf8,
                KeyKind::Float => DataType::Float64,
            };
            Field::new(c.name, dt, c.nullable)
        })
        .collect();
    fields.push(Field::new(DATE_COLUMN, DataType::Date32, false));
    fields.push(Field::new("Confirmed", DataType::UInt64, false));
    fields.push(Field::new("Deaths", DataType::UInt64, false));
    Schema::new(fields)
}

pub fn to_record_batch<K: LocationKey>(table: &CompleteTable<K>) -> Result<RecordBatch> {
    let mut arrays: Vec<ArrayRef> = key_columns(&table.rows)?
        .into_iter()
        .map(|col| match col {
            ColumnData::Text(v) => Arc::new(StringArray::from(v)) as ArrayRef,
            ColumnData::Float(v) => Arc::new(Float64Array::from(v)) as ArrayRef,
        })
        .collect();
    arrays.push(Arc::new(Date32Array::from_iter_values(
        table
            .rows
            .iter()
            .map(|r| r.date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
    )));
    arrays.push(Arc::new(UInt64Array::from_iter_values(
        table.rows.iter().map(|r| r.confirmed),
    )));
    arrays.push(Arc::new(UInt64Array::from_iter_values(
        table.rows.iter().map(|r| r.deaths),
    )));

    RecordBatch::try_new(Arc::new(arrow_schema::<K>()), arrays)
        .map_err(|e| EtlError::Schema(format!("building record batch: {e}")))
}

/// Write `table` as a single Snappy-compressed Parquet file, replacing `path`.
#[instrument(level = "info", skip(table, path), fields(path = %path.display()))]
pub fn write_parquet<K: LocationKey>(table: &CompleteTable<K>, path: &Path) -> Result<()> {
    let target = path.display().to_string();
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| EtlError::persist(&target, e))?;
    }

    let batch = to_record_batch(table)?;
    let file = File::create(path).map_err(|e| EtlError::persist(&target, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| EtlError::persist(&target, e))?;
    writer
        .write(&batch)
        .map_err(|e| EtlError::persist(&target, e))?;
    writer.close().map_err(|e| EtlError::persist(&target, e))?;

    info!(rows = batch.num_rows(), "wrote parquet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{CompleteRow, Location};
    use chrono::NaiveDate;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    #[test]
    fn parquet_roundtrip_preserves_rows_and_schema() {
        let d = |day| NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
        let key = Location {
            province: Some("Hubei".into()),
            country: "China".into(),
            lat: Some(30.9756),
            long: Some(112.2707),
        };
        let table = CompleteTable {
            rows: (22..=24)
                .map(|day| CompleteRow {
                    key: key.clone(),
                    date: d(day),
                    confirmed: 100 * day as u64,
                    deaths: day as u64,
                })
                .collect(),
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/covid.parquet");
        write_parquet(&table, &path).unwrap();

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let total: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 3);

        let batch = &batches[0];
        let names: Vec<_> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(
            names,
            vec!["Province/State", "Country/Region", "Lat", "Long", "Date", "Confirmed", "Deaths"]
        );
        let dates = batch
            .column(4)
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        // 2020-01-22 is day 18283 after the epoch
        assert_eq!(dates.value(0), 18_283);
        let confirmed = batch
            .column(5)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap();
        assert_eq!(confirmed.value(2), 2400);
    }
}

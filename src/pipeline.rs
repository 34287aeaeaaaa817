//! The three stages as the binaries run them, each driven by a [`Config`].

use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::fetch::{self, sources::source_for};
use crate::fill::fill_gaps;
use crate::persist::{self, postgres};
use crate::raw;
use crate::reshape::{aggregate_by_country, reshape_and_merge};
use crate::table::{CompleteTable, Country, Location, LocationKey, Metric};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Where the transform stage put its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub csv_path: PathBuf,
    pub parquet_path: Option<PathBuf>,
    pub rows: usize,
}

/// Fetch stage: download every source into `raw_dir`.
pub async fn run_fetch(config: &Config) -> Result<Vec<PathBuf>> {
    let client = fetch::build_client(config)?;
    fetch::fetch_all(&client, config).await
}

fn source_prefix(config: &Config, metric: Metric) -> Result<&str> {
    source_for(&config.sources, metric)
        .map(|s| s.name.as_str())
        .ok_or_else(|| EtlError::Config(format!("need exactly one `{metric}` source")))
}

/// Transform stage: latest raw files → reshaped, merged, gap-filled table
/// written under `processed_dir`.
#[instrument(level = "info", skip_all)]
pub fn run_transform(config: &Config) -> Result<TransformOutput> {
    let confirmed = raw::load_latest(
        &config.raw_dir,
        source_prefix(config, Metric::Confirmed)?,
        Metric::Confirmed,
    )?;
    let deaths = raw::load_latest(
        &config.raw_dir,
        source_prefix(config, Metric::Deaths)?,
        Metric::Deaths,
    )?;

    let merged = reshape_and_merge(&confirmed, &deaths)?;
    if config.aggregate_by_country {
        write_processed(&fill_gaps(&aggregate_by_country(&merged))?, config)
    } else {
        write_processed(&fill_gaps(&merged)?, config)
    }
}

fn write_processed<K: LocationKey>(
    table: &CompleteTable<K>,
    config: &Config,
) -> Result<TransformOutput> {
    let csv_path = config.processed_path();
    persist::write_csv(table, &csv_path)?;

    let parquet_path = if config.write_parquet {
        let path = csv_path.with_extension("parquet");
        persist::write_parquet(table, &path)?;
        Some(path)
    } else {
        None
    };
    info!(path = %csv_path.display(), rows = table.len(), "cleaned data saved");
    Ok(TransformOutput {
        csv_path,
        parquet_path,
        rows: table.len(),
    })
}

/// The processed file, keyed the way `aggregate_by_country` wrote it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedTable {
    Country(CompleteTable<Country>),
    Location(CompleteTable<Location>),
}

impl ProcessedTable {
    pub fn len(&self) -> usize {
        match self {
            ProcessedTable::Country(t) => t.len(),
            ProcessedTable::Location(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read the processed CSV back with the key type matching the config.
pub fn read_processed(config: &Config) -> Result<ProcessedTable> {
    let path = config.processed_path();
    if config.aggregate_by_country {
        persist::read_csv(&path).map(ProcessedTable::Country)
    } else {
        persist::read_csv(&path).map(ProcessedTable::Location)
    }
}

/// Load stage: read the processed CSV and replace the SQL table with it.
#[instrument(level = "info", skip_all, fields(table = %config.table_name))]
pub async fn run_load(config: &Config) -> Result<u64> {
    let table = read_processed(config)?;
    info!(rows = table.len(), "read processed table");
    match &table {
        ProcessedTable::Country(t) => load_table(config, t).await,
        ProcessedTable::Location(t) => load_table(config, t).await,
    }
}

async fn load_table<K: LocationKey>(config: &Config, table: &CompleteTable<K>) -> Result<u64> {
    let mut client = postgres::connect(config).await?;
    postgres::replace_table(&mut client, &config.table_name, table).await
}

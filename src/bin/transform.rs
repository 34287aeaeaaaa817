use anyhow::{Context, Result};
use covid_etl::{logging, pipeline, Config};
use std::process::ExitCode;
use tracing::info;

fn main() -> ExitCode {
    logging::init();
    logging::report(run())
}

fn run() -> Result<()> {
    let config = Config::load().context("loading config")?;

    let out = pipeline::run_transform(&config).context("transforming raw CSVs")?;
    info!(rows = out.rows, path = %out.csv_path.display(), "cleaned data saved");
    if let Some(p) = &out.parquet_path {
        info!(path = %p.display(), "parquet copy saved");
    }
    Ok(())
}

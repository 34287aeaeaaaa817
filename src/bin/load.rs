use anyhow::{Context, Result};
use covid_etl::{logging, pipeline, Config};
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    logging::report(run().await)
}

async fn run() -> Result<()> {
    let config = Config::load().context("loading config")?;

    let inserted = pipeline::run_load(&config).await.with_context(|| {
        format!(
            "loading {} into table {}",
            config.processed_path().display(),
            config.table_name
        )
    })?;
    info!(inserted, table = %config.table_name, "data uploaded successfully");
    Ok(())
}

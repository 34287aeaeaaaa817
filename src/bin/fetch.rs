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

    let saved = pipeline::run_fetch(&config)
        .await
        .context("fetching raw CSVs")?;
    for path in &saved {
        info!(path = %path.display(), "saved");
    }
    info!("all files downloaded successfully");
    Ok(())
}

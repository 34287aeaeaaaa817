use anyhow::{Context, Result};
use covid_etl::{logging, pipeline, Config};
use std::{process::ExitCode, time::Instant};
use tracing::info;

/// Full run: fetch, transform and load, in that order.
#[tokio::main]
async fn main() -> ExitCode {
    // ─── 1) init logging ─────────────────────────────────────────────
    logging::init();
    logging::report(run().await)
}

async fn run() -> Result<()> {
    let start = Instant::now();
    info!("startup");

    // ─── 2) config ───────────────────────────────────────────────────
    let config = Config::load().context("loading config")?;

    // ─── 3) fetch raw CSVs ───────────────────────────────────────────
    let saved = pipeline::run_fetch(&config)
        .await
        .context("fetch stage")?;
    info!(files = saved.len(), dir = %config.raw_dir.display(), "fetched");

    // ─── 4) reshape + gap-fill ───────────────────────────────────────
    let out = pipeline::run_transform(&config).context("transform stage")?;
    info!(rows = out.rows, path = %out.csv_path.display(), "transformed");

    // ─── 5) replace the SQL table ────────────────────────────────────
    let inserted = pipeline::run_load(&config).await.context("load stage")?;
    info!(inserted, table = %config.table_name, elapsed = ?start.elapsed(), "all done");
    Ok(())
}

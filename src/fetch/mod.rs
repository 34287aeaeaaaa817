//! Fetcher: download each configured resource to a timestamped raw file.

pub mod download;
pub mod retention;
pub mod sources;

pub use download::{download_csv, raw_file_name};
pub use retention::RetentionPolicy;
pub use sources::Source;

use crate::config::Config;
use crate::error::{EtlError, Result};
use reqwest::Client;
use std::path::PathBuf;
use tracing::{info, instrument};

/// HTTP client with the configured overall request timeout.
pub fn build_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(config.http_timeout())
        .user_agent(concat!("covid_etl/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| EtlError::Config(format!("building HTTP client: {e}")))
}

/// Download every source in order. The first failure aborts the whole fetch.
/// Retention runs only after all downloads succeeded.
#[instrument(level = "info", skip_all, fields(sources = config.sources.len()))]
pub async fn fetch_all(client: &Client, config: &Config) -> Result<Vec<PathBuf>> {
    let mut saved = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        saved.push(download_csv(client, source, &config.raw_dir).await?);
    }

    let policy = config.retention();
    for source in &config.sources {
        policy.apply(&config.raw_dir, &source.name)?;
    }
    info!(files = saved.len(), "all files downloaded");
    Ok(saved)
}

use super::sources::Source;
use crate::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, instrument};

/// Compact ISO 8601 basic UTC timestamp embedded in raw file names.
pub const RAW_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// `<name>_<YYYYMMDDThhmmssZ>.csv`
pub fn raw_file_name(name: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.csv", name, at.format(RAW_TIMESTAMP_FORMAT))
}

/// Download `source` into `dest_dir` under a fresh timestamped name.
/// Returns the full path of the saved file. Existing files are never overwritten.
#[instrument(level = "info", skip(client, source, dest_dir), fields(name = %source.name))]
pub async fn download_csv(
    client: &Client,
    source: &Source,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| EtlError::io(dest_dir, e))?;
    let dest_path = dest_dir.join(raw_file_name(&source.name, Utc::now()));

    let fetch_err = |e: reqwest::Error| EtlError::Fetch {
        name: source.name.clone(),
        url: source.url.to_string(),
        source: e,
    };
    info!(url = %source.url, "downloading");
    let resp = client
        .get(source.url.clone())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?;
    let bytes = resp.bytes().await.map_err(fetch_err)?;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&dest_path)
        .await
        .map_err(|e| EtlError::io(&dest_path, e))?;
    file.write_all(&bytes)
        .await
        .map_err(|e| EtlError::io(&dest_path, e))?;
    file.flush().await.map_err(|e| EtlError::io(&dest_path, e))?;

    info!(path = %dest_path.display(), bytes = bytes.len(), "saved");
    Ok(dest_path)
}

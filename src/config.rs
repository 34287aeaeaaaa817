use crate::error::{EtlError, Result};
use crate::fetch::retention::RetentionPolicy;
use crate::fetch::sources::{default_sources, source_for, Source};
use crate::table::Metric;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

/// Env var naming the YAML config file.
pub const CONFIG_ENV: &str = "COVID_ETL_CONFIG";
/// Config file picked up from the working directory when `CONFIG_ENV` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "covid_etl.yaml";

/// Runtime configuration, passed explicitly into every stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    /// File name of the processed CSV inside `processed_dir`.
    pub processed_file: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    /// Target table, replaced wholesale on every load.
    pub table_name: String,
    /// Collapse province rows into one row per country and date.
    pub aggregate_by_country: bool,
    /// Also write a `.parquet` copy of the processed table.
    pub write_parquet: bool,
    pub http_timeout_secs: u64,
    pub db_connect_timeout_secs: u64,
    /// Raw files kept per resource after a fetch. `None` keeps everything.
    pub raw_retention: Option<usize>,
    pub sources: Vec<Source>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            processed_file: "covid_global_cleaned.csv".into(),
            db_host: "localhost".into(),
            db_port: 5432,
            db_user: "postgres".into(),
            db_password: "postgres".into(),
            db_name: "covid_data".into(),
            table_name: "covid_stats".into(),
            aggregate_by_country: true,
            write_parquet: false,
            http_timeout_secs: 60,
            db_connect_timeout_secs: 10,
            raw_retention: None,
            sources: default_sources(),
        }
    }
}

impl Config {
    /// Resolve the config the binaries run with: `$COVID_ETL_CONFIG`, else
    /// `./covid_etl.yaml` if present, else defaults. `COVID_ETL_DB_*` env vars
    /// override the database settings afterwards.
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => {
                debug!("no config file, using defaults");
                Config::default()
            }
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| EtlError::io(path, e))?;
        let config: Config = serde_yaml::from_str(&text)
            .map_err(|e| EtlError::Config(format!("parsing {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// `lookup` is `std::env::var` in production; tests pass a closure.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("COVID_ETL_DB_HOST") {
            self.db_host = v;
        }
        if let Some(v) = lookup("COVID_ETL_DB_PORT") {
            self.db_port = v
                .parse()
                .map_err(|_| EtlError::Config(format!("COVID_ETL_DB_PORT={v:?} is not a port")))?;
        }
        if let Some(v) = lookup("COVID_ETL_DB_USER") {
            self.db_user = v;
        }
        if let Some(v) = lookup("COVID_ETL_DB_PASSWORD") {
            self.db_password = v;
        }
        if let Some(v) = lookup("COVID_ETL_DB_NAME") {
            self.db_name = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(EtlError::Config("no sources configured".into()));
        }
        for s in &self.sources {
            if s.name.is_empty() || s.name.contains(['/', '\\']) {
                return Err(EtlError::Config(format!(
                    "source name {:?} must be a non-empty file name prefix",
                    s.name
                )));
            }
        }
        for metric in [Metric::Confirmed, Metric::Deaths] {
            if source_for(&self.sources, metric).is_none() {
                return Err(EtlError::Config(format!(
                    "need exactly one `{metric}` source"
                )));
            }
        }
        if !is_sql_identifier(&self.table_name) {
            return Err(EtlError::Config(format!(
                "table_name {:?} is not a plain SQL identifier",
                self.table_name
            )));
        }
        if self.processed_file.is_empty() {
            return Err(EtlError::Config("processed_file is empty".into()));
        }
        Ok(())
    }

    pub fn processed_path(&self) -> PathBuf {
        self.processed_dir.join(&self.processed_file)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.db_connect_timeout_secs)
    }

    pub fn retention(&self) -> RetentionPolicy {
        match self.raw_retention {
            Some(n) => RetentionPolicy::KeepLatest(n),
            None => RetentionPolicy::KeepAll,
        }
    }
}

fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

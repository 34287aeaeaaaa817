use std::path::PathBuf;

/// Every failure the pipeline can hit. All of them abort the run.
#[derive(thiserror::Error, Debug)]
pub enum EtlError {
    #[error("fetching {name} from {url} failed")]
    Fetch {
        name: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("no `{prefix}*.csv` file in {}", .dir.display())]
    NotFound { dir: PathBuf, prefix: String },
    #[error("cannot parse date column header {header:?} (expected M/D/YY)")]
    DateParse { header: String },
    #[error("persisting to {target} failed: {reason}")]
    Persist { target: String, reason: String },
    #[error("schema error: {0}")]
    Schema(String),
    #[error("duplicate row for {key} on {date}")]
    DuplicateKey { key: String, date: chrono::NaiveDate },
    #[error("invalid count {value} for {key} on {date}")]
    InvalidCount {
        key: String,
        date: chrono::NaiveDate,
        value: f64,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error in {}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl EtlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        EtlError::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn persist(target: impl Into<String>, reason: impl ToString) -> Self {
        EtlError::Persist {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

use crate::error::{EtlError, Result};
use crate::fetch::download::RAW_TIMESTAMP_FORMAT;
use chrono::NaiveDateTime;
use glob::{glob, Pattern};
use regex::Regex;
use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Tabular extensions the loader accepts, compared case-insensitively.
pub const RAW_EXTENSIONS: &[&str] = &["csv"];

/// A raw file belonging to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub path: PathBuf,
    pub file_name: String,
    /// Fetch time parsed from the `_YYYYMMDDThhmmssZ` suffix, if present.
    pub fetched_at: Option<NaiveDateTime>,
}

/// Newest fetch last. Files without a parseable timestamp sort before any that
/// have one; ties fall back to plain file name order, which for well-formed
/// names is the same order.
impl Ord for RawFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fetched_at
            .cmp(&other.fetched_at)
            .then_with(|| self.file_name.cmp(&other.file_name))
    }
}

impl PartialOrd for RawFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Names owned by `prefix`: `<prefix>.<ext>` or `<prefix>_<YYYYMMDDThhmmssZ>.<ext>`.
/// Anything else after the prefix (`cases_deaths_...` for `cases`) belongs to
/// another resource.
fn name_re(prefix: &str) -> Result<Regex> {
    Regex::new(&format!(
        r"^{}(?:_(\d{{8}}T\d{{6}}Z))?\.([^.]+)$",
        regex::escape(prefix)
    ))
    .map_err(|e| EtlError::Config(format!("bad raw file prefix {prefix:?}: {e}")))
}

/// Match `file_name` against the resource pattern, returning the parsed fetch
/// time (`None` for an untimestamped or invalid stamp).
fn parse_raw_name(re: &Regex, file_name: &str) -> Option<Option<NaiveDateTime>> {
    let caps = re.captures(file_name)?;
    let ext = caps.get(2)?.as_str();
    if !RAW_EXTENSIONS.iter().any(|r| ext.eq_ignore_ascii_case(r)) {
        return None;
    }
    Some(
        caps.get(1)
            .and_then(|ts| NaiveDateTime::parse_from_str(ts.as_str(), RAW_TIMESTAMP_FORMAT).ok()),
    )
}

/// All regular raw files of resource `prefix` in `dir`, oldest first.
/// A missing directory yields an empty list.
pub fn list_raw_files(dir: &Path, prefix: &str) -> Result<Vec<RawFile>> {
    let re = name_re(prefix)?;
    let pattern = format!(
        "{}/{}*",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(prefix)
    );
    let entries = glob(&pattern)
        .map_err(|e| EtlError::Config(format!("bad raw file pattern {pattern:?}: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            EtlError::io(path, e.into())
        })?;
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
        else {
            continue;
        };
        let fetched_at = match parse_raw_name(&re, &file_name) {
            Some(ts) if path.is_file() => ts,
            _ => {
                debug!(path = %path.display(), "skipping");
                continue;
            }
        };
        files.push(RawFile {
            path,
            file_name,
            fetched_at,
        });
    }
    files.sort();
    Ok(files)
}

/// The most recently fetched raw file for `prefix`.
#[instrument(level = "debug", skip(dir), fields(dir = %dir.display()))]
pub fn find_latest(dir: &Path, prefix: &str) -> Result<RawFile> {
    let latest = list_raw_files(dir, prefix)?
        .pop()
        .ok_or_else(|| EtlError::NotFound {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
        })?;
    info!(file = %latest.file_name, "using latest raw file");
    Ok(latest)
}

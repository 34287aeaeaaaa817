use crate::error::{EtlError, Result};
use crate::raw::list_raw_files;
use std::{fs, path::Path, path::PathBuf};
use tracing::info;

/// How many fetched raw files to keep per resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    #[default]
    KeepAll,
    /// Keep the newest `n` files (at least one is always kept).
    KeepLatest(usize),
}

impl RetentionPolicy {
    /// Delete raw files for `prefix` that fall outside the policy.
    /// Returns the removed paths.
    pub fn apply(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        let keep = match *self {
            RetentionPolicy::KeepAll => return Ok(Vec::new()),
            RetentionPolicy::KeepLatest(n) => n.max(1),
        };
        let files = list_raw_files(dir, prefix)?;
        let excess = files.len().saturating_sub(keep);

        let mut removed = Vec::with_capacity(excess);
        for f in files.into_iter().take(excess) {
            fs::remove_file(&f.path).map_err(|e| EtlError::io(&f.path, e))?;
            info!(file = %f.file_name, "pruned raw file");
            removed.push(f.path);
        }
        Ok(removed)
    }
}

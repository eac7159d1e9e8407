//! Delta file discovery: one directory level, names matching the delta file pattern.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::engine::tools::is_delta_file;

/// One result from listing a directory: either a path to consider or an error with optional path.
pub enum WalkOutcome {
    Ok(PathBuf),
    Err { msg: String, path: Option<PathBuf> },
}

/// Convert a walkdir result into [`WalkOutcome`]. Symlinks count by their target type.
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> Option<WalkOutcome> {
    match r {
        Ok(entry) if entry.file_type().is_file() => Some(WalkOutcome::Ok(entry.into_path())),
        Ok(_) => None,
        Err(err) => Some(WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
        }),
    }
}

/// List the delta files directly inside `dir`, sorted by path. Subdirectories are not entered.
/// Unreadable entries are skipped with a warning; an unreadable `dir` is an error.
pub fn discover_delta_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(dir)
        .with_context(|| format!("read deltas directory {}", dir.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = Vec::new();
    let mut skipped = 0_usize;
    let iter = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(to_outcome_walkdir);
    for outcome in iter {
        match outcome {
            WalkOutcome::Ok(path) => {
                if is_delta_file(&path) {
                    paths.push(path);
                }
            }
            WalkOutcome::Err { msg, path } => {
                if path.as_deref() == Some(dir) {
                    anyhow::bail!("list deltas directory {}: {}", dir.display(), msg);
                }
                warn!("Skipping unreadable entry: {}", msg);
                skipped += 1;
            }
        }
    }
    paths.sort();
    debug!(
        "Found {} delta files in {} ({} entries skipped)",
        paths.len(),
        dir.display(),
        skipped
    );
    Ok(paths)
}

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

/// In-progress path for `final_path`: same directory, package temp suffix appended. The name no
/// longer matches the delta file pattern, so a later run over the same directory skips it.
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PackagePaths::get().pkg_name().to_string());
    final_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("{name}{}", PackagePaths::get().temp_suffix()))
}

/// Output written under a temp name and renamed over the final path on [`TempOutput::persist`].
/// Dropped without persisting, the temp file is removed.
pub struct TempOutput {
    temp_path: PathBuf,
    final_path: PathBuf,
    persisted: bool,
}

impl TempOutput {
    /// Prepare a temp path for `final_path`, removing a stale one from an earlier crashed run.
    pub fn new(final_path: &Path) -> Result<Self> {
        let temp_path = temp_path_for(final_path);
        if temp_path.exists() {
            fs::remove_file(&temp_path)
                .with_context(|| format!("remove stale temp output {}", temp_path.display()))?;
        }
        Ok(TempOutput {
            temp_path,
            final_path: final_path.to_path_buf(),
            persisted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically replace the final path (clobbering any existing file) with the temp file.
    pub fn persist(mut self) -> Result<PathBuf> {
        fs::rename(&self.temp_path, &self.final_path).with_context(|| {
            format!(
                "atomic rename temp output to final path ({} -> {})",
                self.temp_path.display(),
                self.final_path.display()
            )
        })?;
        self.persisted = true;
        Ok(self.final_path.clone())
    }
}

impl Drop for TempOutput {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

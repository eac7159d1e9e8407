//! Catalog filtering: keep the catalog rows whose `TARGETID` is in a target id set.

use anyhow::{Context, Result, anyhow};
use log::debug;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::AtomicUsize;

use crate::engine::progress::{
    ProgressBarConfig, create_progress_bar, flush_progress_remainder, report_progress_batched,
};
use crate::fits::{FitsFile, RowTable};
use crate::pipeline::resolve_workers;
use crate::types::{SplitOpts, TargetId, TargetIds};
use crate::utils::config::{CATALOG_TABLE_SECTION, ProgressConsts, TARGETID_KEY};

/// Read the catalog table (the first extension) of `path`.
pub fn read_catalog(path: &Path) -> Result<RowTable> {
    let file = FitsFile::open(path).with_context(|| format!("open catalog {}", path.display()))?;
    let section = file.section(CATALOG_TABLE_SECTION).ok_or_else(|| {
        anyhow!(
            "catalog {} has no table section (found {} sections)",
            file.path().display(),
            file.len()
        )
    })?;
    RowTable::from_section(section).with_context(|| format!("read catalog table {}", path.display()))
}

impl RowTable {
    /// `TARGETID` of row `index`.
    pub fn target_id(&self, index: usize) -> Result<TargetId> {
        let column = self
            .column(TARGETID_KEY)
            .ok_or_else(|| anyhow!("catalog has no {TARGETID_KEY} column"))?;
        Ok(self.read_i64(index, column)?)
    }

    /// All `TARGETID`s of the table.
    pub fn target_ids(&self) -> Result<TargetIds> {
        (0..self.len()).map(|i| self.target_id(i)).collect()
    }
}

/// Membership flag per row, computed on a pool of `workers` threads. Flags come back in row
/// order regardless of which worker evaluated them.
pub fn membership_mask(
    table: &RowTable,
    ids: &TargetIds,
    workers: usize,
    progress: bool,
) -> Result<Vec<bool>> {
    let column = table
        .column(TARGETID_KEY)
        .ok_or_else(|| anyhow!("catalog has no {TARGETID_KEY} column"))?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("build catalog worker pool")?;

    let bar = progress.then(|| {
        create_progress_bar(ProgressBarConfig::new(
            table.len(),
            "Catalog rows",
            kdam::Animation::Classic,
        ))
    });
    let counter = AtomicUsize::new(0);
    let chunk = ProgressConsts::ROW_UPDATE_BATCH_SIZE;

    let mask = pool.install(|| {
        (0..table.len())
            .into_par_iter()
            .map(|row| -> Result<bool> {
                let id = table.read_i64(row, column)?;
                report_progress_batched(bar.as_ref(), &counter, chunk);
                Ok(ids.contains(id))
            })
            .collect::<Result<Vec<bool>>>()
    })?;
    flush_progress_remainder(bar.as_ref(), table.len(), chunk);
    Ok(mask)
}

/// Filter the catalog at `path` down to rows whose `TARGETID` is in `ids`.
///
/// Rows keep their original order and all columns. Nothing is written; use
/// [`RowTable::write_to`] to persist the result.
pub fn filter_catalog(path: &Path, ids: &TargetIds, opts: &SplitOpts) -> Result<RowTable> {
    let table = read_catalog(path)?;
    let workers = resolve_workers(opts.num_threads)?;
    debug!(
        "Catalog {}: {} rows, {} target ids, {} workers",
        path.display(),
        table.len(),
        ids.len(),
        workers
    );
    let mask = membership_mask(&table, ids, workers, opts.progress)?;
    let filtered = table.retain_mask(&mask);
    debug!("Catalog {}: kept {} rows", path.display(), filtered.len());
    Ok(filtered)
}

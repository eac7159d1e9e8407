//! Single-file filtering: copy the selected sections of one delta file into a new file of the
//! same name in the output directory.

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::fits::{FitsFile, FitsWriter, Value, wants_gzip};
use crate::select::target_id;
use crate::types::{FileOutcome, FileStatus, SelectionPolicy};
use crate::utils::TempOutput;

/// Output path for `input`: `output_dir` joined with the input's file name.
pub fn output_path_for(input: &Path, output_dir: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .ok_or_else(|| anyhow!("input path has no file name: {}", input.display()))?;
    Ok(output_dir.join(name))
}

/// Filter one delta file into `output_dir/<file name>`, replacing any existing file there.
///
/// Section 0 is the preamble and is never evaluated or copied. Each kept section is written with
/// its original header and payload, named (`EXTNAME`) after its `TARGETID`. An incomplete policy
/// still writes a valid file with no data sections and reports
/// [`FileStatus::EmptyByPolicy`].
///
/// Errors when the input cannot be read or a section lacks `TARGETID` (or the threshold field).
/// Output goes to a temp file first, so a failed run leaves no partial file at the final path.
pub fn filter_file(input: &Path, output_dir: &Path, policy: &SelectionPolicy) -> Result<FileOutcome> {
    let final_path = output_path_for(input, output_dir)?;
    let temp = TempOutput::new(&final_path)?;
    let mut writer = FitsWriter::create(temp.path(), wants_gzip(&final_path))
        .with_context(|| format!("create output {}", final_path.display()))?;

    let delta_file =
        FitsFile::open(input).with_context(|| format!("open delta file {}", input.display()))?;

    if let SelectionPolicy::Incomplete(missing) = policy {
        warn!(
            "{}: {}; output file will be empty (no selected deltas)",
            input.display(),
            missing
        );
    }

    let mut scanned = 0_usize;
    for section in delta_file.sections().skip(1) {
        scanned += 1;
        let header = section.header();
        let id = target_id(header)
            .with_context(|| format!("{}: section {}", input.display(), section.index))?;
        if !policy
            .keeps(id, header)
            .with_context(|| format!("{}: section {}", input.display(), section.index))?
        {
            continue;
        }
        let mut out_header = header.clone();
        out_header.set("EXTNAME", Value::Str(id.to_string()));
        writer
            .write_section(&out_header, section.data())
            .with_context(|| format!("write section {id} to {}", temp.path().display()))?;
    }

    let kept = writer
        .finish()
        .with_context(|| format!("close output {}", temp.path().display()))?;
    drop(delta_file);
    let output = temp.persist()?;
    debug!(
        "{}: kept {}/{} sections -> {}",
        input.display(),
        kept,
        scanned,
        output.display()
    );

    let status = match policy {
        SelectionPolicy::Incomplete(missing) => FileStatus::EmptyByPolicy {
            reason: missing.to_string(),
        },
        _ => FileStatus::Success,
    };
    Ok(FileOutcome {
        input: input.to_path_buf(),
        output: Some(output),
        status,
        sections_scanned: scanned,
        sections_kept: kept,
    })
}

/// [`filter_file`] with errors folded into a [`FileStatus::Failed`] outcome (logged as a
/// warning), for callers that report per file instead of stopping.
pub fn filter_file_outcome(input: &Path, output_dir: &Path, policy: &SelectionPolicy) -> FileOutcome {
    filter_file(input, output_dir, policy).unwrap_or_else(|err| {
        warn!("{}: {:#}", input.display(), err);
        FileOutcome::failed(input, format!("{err:#}"))
    })
}

use log::warn;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::types::{FanOutReport, FileOutcome};

/// Give every dispatched path exactly one outcome. Paths that never reported (their worker died)
/// are marked failed. Outcomes are sorted by input path.
pub fn reconcile_outcomes(paths: &[PathBuf], mut outcomes: Vec<FileOutcome>) -> FanOutReport {
    let reported: HashSet<PathBuf> = outcomes.iter().map(|o| o.input.clone()).collect();
    for path in paths {
        if !reported.contains(path) {
            outcomes.push(FileOutcome::failed(path, "worker exited before reporting"));
        }
    }
    outcomes.sort_by(|a, b| a.input.cmp(&b.input));
    FanOutReport { outcomes }
}

/// Log a one-line summary, plus a warning when any file failed.
pub fn log_report(report: &FanOutReport) {
    log::debug!(
        "Done: {} written, {} empty by policy, {} failed",
        report.succeeded(),
        report.empty_by_policy(),
        report.failed()
    );
    if report.failed() > 0 {
        warn!(
            "{} of {} delta files failed",
            report.failed(),
            report.outcomes.len()
        );
    }
}

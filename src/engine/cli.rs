//! CLI command handler: run one subcommand and report per-file outcomes.

use anyhow::{Context, Result, bail};
use log::info;
use std::path::Path;

use crate::engine::arg_parser::{Cli, Commands, CommonArgs};
use crate::utils::datasplit_toml::{apply_file_to_opts, load_datasplit_toml};
use crate::utils::config::LIST_THRESHOLD;
use crate::utils::{Colors, setup_logging};
use crate::{
    FanOutReport, Opts, SplitOpts, TargetIds, filter_catalog, filter_directory,
};
use crate::delta::filter_file_outcome;

/// Defaults, then `.datasplit.toml` in the working directory, then command-line flags.
fn setup_opts(common: &CommonArgs) -> Result<Opts> {
    let mut opts = Opts::default();
    if let Some(file) = load_datasplit_toml(Path::new("."))? {
        apply_file_to_opts(&file, &mut opts)?;
    }
    if let Some(v) = common.verbose {
        opts.verbose = v;
    }
    if common.threads.is_some() {
        opts.num_threads = common.threads;
    }
    if common.ids.is_some() {
        opts.ids_path = common.ids.clone();
    }
    if common.field.is_some() {
        opts.field = common.field.clone();
    }
    if common.value.is_some() {
        opts.value = common.value;
    }
    if common.criterion.is_some() {
        opts.criterion = common.criterion;
    }
    if common.report.is_some() {
        opts.report_path = common.report.clone();
    }
    setup_logging(opts.verbose);
    Ok(opts)
}

/// Run the selected subcommand. Returns false when any file failed.
pub fn handle_run(cli: &Cli) -> Result<bool> {
    let opts = setup_opts(&cli.common)?;
    let split_opts = SplitOpts::from(&opts);

    match &cli.command {
        Commands::Deltas { dir, out_dir } => {
            let policy = opts.selection_policy()?;
            let report = filter_directory(dir, out_dir, &policy, &split_opts)?;
            finish_report(&opts, &report)
        }
        Commands::File { file, out_dir } => {
            let policy = opts.selection_policy()?;
            let outcome = filter_file_outcome(file, out_dir, &policy);
            finish_report(
                &opts,
                &FanOutReport {
                    outcomes: vec![outcome],
                },
            )
        }
        Commands::Catalog { catalog, out } => {
            let Some(ids_path) = opts.ids_path.as_deref() else {
                bail!("catalog filtering needs a target id list (--ids)");
            };
            let ids = TargetIds::load(ids_path)?;
            let filtered = filter_catalog(catalog, &ids, &split_opts)?;
            filtered
                .write_to(out)
                .with_context(|| format!("write filtered catalog {}", out.display()))?;
            info!(
                "Kept {} catalog rows -> {}",
                filtered.len(),
                out.display()
            );
            Ok(true)
        }
    }
}

/// Write the JSON report when requested and print the summary.
fn finish_report(opts: &Opts, report: &FanOutReport) -> Result<bool> {
    if let Some(path) = &opts.report_path {
        let json = serde_json::to_string_pretty(report).context("serialize report")?;
        std::fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
    }
    print_summary(report);
    Ok(report.failed() == 0)
}

/// Print run summary
fn print_summary(report: &FanOutReport) {
    info!(
        "{} | {} | {}",
        Colors::colorize(Colors::SUCCESS, &format!("Written: {}", report.succeeded())),
        Colors::colorize(
            Colors::EMPTY,
            &format!("Empty by policy: {}", report.empty_by_policy())
        ),
        Colors::colorize(Colors::FAILED, &format!("Failed: {}", report.failed()))
    );
    for outcome in report.failures().take(LIST_THRESHOLD) {
        if let crate::FileStatus::Failed { reason } = &outcome.status {
            eprintln!("  failed: {} ({})", outcome.input.display(), reason);
        }
    }
    if report.failed() > LIST_THRESHOLD {
        eprintln!("  ... and {} more", report.failed() - LIST_THRESHOLD);
    }
}

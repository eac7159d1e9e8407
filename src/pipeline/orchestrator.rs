use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::engine::progress::{ProgressBarConfig, advance_progress_bar, create_progress_bar};
use crate::pipeline;
use crate::types::{FanOutReport, SelectionPolicy, SplitOpts};
use crate::utils::cap_workers_by_fd_limit;
use crate::utils::config::WorkerThreadLimits;

/// Worker count: `requested` when given (must be positive), else all available threads.
pub fn resolve_workers(requested: Option<usize>) -> Result<usize> {
    match requested {
        Some(0) => bail!("worker count must be positive"),
        Some(n) => Ok(n),
        None => {
            let limits = WorkerThreadLimits::current();
            Ok(limits.all_threads.max(limits.floor))
        }
    }
}

/// Start the filter workers over `paths`. Returns the outcome receiver and worker handles;
/// caller receives from `outcome_rx` and must join `worker_handles` when done.
pub fn run_pipeline(
    paths: &[PathBuf],
    ctx: &pipeline::FanOutContext,
    num_threads: usize,
) -> pipeline::PipelineHandles {
    let channels = pipeline::create_pipeline_channels(paths.len());
    for path in paths {
        // Capacity covers every path, so this never blocks.
        let _ = channels.path_tx.send(path.clone());
    }
    // Closing the path channel lets workers exit once it is drained.
    drop(channels.path_tx);

    let worker_handles =
        pipeline::spawn_filter_workers(&channels.path_rx, &channels.outcome_tx, ctx, num_threads);

    // Dropping the last sender closes the channel so the receive loop ends.
    drop(channels.outcome_tx);

    pipeline::PipelineHandles {
        outcome_rx: channels.outcome_rx,
        worker_handles,
    }
}

/// Filter every delta file in `input_dir` into `output_dir` with the same `policy`, spread over a
/// pool of worker threads. Files are independent; their completion order is unspecified.
///
/// Per-file errors do not stop the batch: they are reported as failed outcomes. Errors only when
/// `input_dir` cannot be listed or `output_dir` cannot be created.
pub fn filter_directory(
    input_dir: &Path,
    output_dir: &Path,
    policy: &SelectionPolicy,
    opts: &SplitOpts,
) -> Result<FanOutReport> {
    let paths = pipeline::discover_delta_files(input_dir)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("create output directory {}", output_dir.display()))?;

    let requested = resolve_workers(opts.num_threads)?;
    let num_threads = cap_workers_by_fd_limit(requested.min(paths.len().max(1)));
    info!("Nb of delta files: {}", paths.len());
    debug!("Workers: {} (requested {})", num_threads, requested);
    debug!("Policy: {}", policy);

    let ctx = pipeline::FanOutContext {
        output_dir: output_dir.to_path_buf(),
        policy: policy.clone(),
    };
    let pipeline::PipelineHandles {
        outcome_rx,
        worker_handles,
    } = run_pipeline(&paths, &ctx, num_threads);

    let bar = opts.progress.then(|| {
        create_progress_bar(ProgressBarConfig::new(
            paths.len(),
            "Filtering",
            kdam::Animation::Classic,
        ))
    });
    let mut outcomes = Vec::with_capacity(paths.len());
    while let Ok(outcome) = outcome_rx.recv() {
        if let Some(bar) = &bar {
            advance_progress_bar(bar, 1);
        }
        outcomes.push(outcome);
    }
    pipeline::shutdown_pipeline_handles(worker_handles);

    let report = pipeline::reconcile_outcomes(&paths, outcomes);
    pipeline::log_report(&report);
    Ok(report)
}

/// Join worker threads (after the outcome stream is drained). A panicked worker is logged; its
/// file is picked up as failed by [`reconcile_outcomes`](super::reconcile_outcomes).
pub fn shutdown_pipeline_handles(worker_handles: Vec<std::thread::JoinHandle<()>>) {
    for h in worker_handles {
        if h.join().is_err() {
            log::error!("filter worker panicked");
        }
    }
}

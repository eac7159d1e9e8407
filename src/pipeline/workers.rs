use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crate::delta::filter_file_outcome;
use crate::types::FileOutcome;

use super::context::FanOutContext;

/// Single filter worker: read paths from path_rx, filter each file, send its outcome on
/// outcome_tx. A failing file becomes a failed outcome; the worker moves on to the next one.
fn filter_worker_loop(path_rx: Receiver<PathBuf>, outcome_tx: Sender<FileOutcome>, ctx: FanOutContext) {
    while let Ok(input) = path_rx.recv() {
        let outcome = filter_file_outcome(&input, &ctx.output_dir, &ctx.policy);
        if outcome_tx.send(outcome).is_err() {
            break;
        }
    }
    drop(outcome_tx);
}

/// Spawn filter workers. Caller must drop its own senders after this so workers exit and the
/// outcome channel closes.
pub fn spawn_filter_workers(
    path_rx: &Receiver<PathBuf>,
    outcome_tx: &Sender<FileOutcome>,
    ctx: &FanOutContext,
    num_threads: usize,
) -> Vec<JoinHandle<()>> {
    (0..num_threads)
        .map(|_| {
            let path_rx = path_rx.clone();
            let outcome_tx = outcome_tx.clone();
            let ctx = ctx.clone();
            thread::spawn(move || filter_worker_loop(path_rx, outcome_tx, ctx))
        })
        .collect()
}

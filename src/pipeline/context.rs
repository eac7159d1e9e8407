//! Pipeline context: shared read-only data for filter workers and the channels that connect them.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::path::PathBuf;
use std::thread::JoinHandle;

use crate::types::{FileOutcome, SelectionPolicy};

/// Read-only context every worker gets a copy of. Identifier sets inside the policy are shared
/// through `Arc`, never mutated.
#[derive(Clone, Debug)]
pub struct FanOutContext {
    pub output_dir: PathBuf,
    pub policy: SelectionPolicy,
}

/// Channels for the pipeline: the coordinator fills `path_tx`; workers read `path_rx` and report on
/// `outcome_tx`.
pub struct PipelineChannels {
    pub path_tx: Sender<PathBuf>,
    pub path_rx: Receiver<PathBuf>,
    pub outcome_tx: Sender<FileOutcome>,
    pub outcome_rx: Receiver<FileOutcome>,
}

/// Handles returned by [`run_pipeline`](super::run_pipeline): receive outcomes, then join.
pub struct PipelineHandles {
    pub outcome_rx: Receiver<FileOutcome>,
    pub worker_handles: Vec<JoinHandle<()>>,
}

/// Both channels sized to hold every file, so neither side ever blocks on send.
pub fn create_pipeline_channels(file_count: usize) -> PipelineChannels {
    let cap = file_count.max(1);
    let (path_tx, path_rx) = bounded::<PathBuf>(cap);
    let (outcome_tx, outcome_rx) = bounded::<FileOutcome>(cap);
    PipelineChannels {
        path_tx,
        path_rx,
        outcome_tx,
        outcome_rx,
    }
}

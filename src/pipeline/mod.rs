//! Directory fan-out: discovery, worker pool, outcome collection.

pub mod context;
pub mod error_handler;
pub mod orchestrator;
pub mod walk;
pub mod workers;

pub use context::{FanOutContext, PipelineChannels, PipelineHandles, create_pipeline_channels};
pub use error_handler::{log_report, reconcile_outcomes};
pub use orchestrator::{filter_directory, resolve_workers, run_pipeline, shutdown_pipeline_handles};
pub use walk::{WalkOutcome, discover_delta_files, to_outcome_walkdir};
pub use workers::spawn_filter_workers;

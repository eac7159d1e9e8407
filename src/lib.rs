//! Datasplit: reproduce data-split subsamples of quasar delta files and quasar catalogs

pub mod catalog;
pub mod delta;
pub mod engine;
pub mod fits;
pub mod pipeline;
pub mod select;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use catalog::{filter_catalog, read_catalog};
pub use delta::filter_file;
pub use fits::RowTable;
pub use pipeline::filter_directory;
pub use select::{keep_by_identifier, keep_by_threshold};

/// Result alias used by public datasplit API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

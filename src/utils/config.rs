//! Application configuration constants.
//! Tuning and naming conventions in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    temp_suffix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                temp_suffix: format!(".{pkg}.tmp"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// CLI config file looked up in the working directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Suffix of in-progress output files (renamed away on success).
    pub fn temp_suffix(&self) -> &str {
        &self.temp_suffix
    }
}

// ---- Naming conventions of the survey products ----

/// Delta files picked up by a directory run.
pub const DELTA_FILE_PATTERN: &str = "delta*.fits.gz";

/// Mandatory identifier keyword (section headers) and column (catalog).
pub const TARGETID_KEY: &str = "TARGETID";

/// Index of the catalog table section (section 0 is the empty primary).
pub const CATALOG_TABLE_SECTION: usize = 1;

// ---- Worker threads ----

/// Thread limits for the worker pool.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Floor when nothing else is known.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }
}

// ---- Reading ----

/// File reading thresholds.
pub struct ReadConsts;

impl ReadConsts {
    /// Plain (uncompressed) files above this size are memory-mapped (bytes). 100 MB.
    pub const MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Initial buffer size for gzip input, as a multiple of the compressed size.
    pub const GZIP_EXPANSION_HINT: usize = 2;
}

// ---- Progress ----

pub struct ProgressConsts;

impl ProgressConsts {
    /// Batch size for progress bar updates over catalog rows (reduce lock contention).
    pub const ROW_UPDATE_BATCH_SIZE: usize = 10_000;
}

// ---- Report / list output ----

/// When more files than this fail, the CLI summary lists only the first ones.
pub const LIST_THRESHOLD: usize = 20;

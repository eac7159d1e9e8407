use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::Comparison;

/// Select data-split subsamples of quasar delta files and catalogs.
#[derive(Clone, Parser)]
#[command(name = "datasplit")]
#[command(
    about = "Filter delta files by target id or header threshold, or a quasar catalog by target id."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Filter every delta*.fits.gz directly inside DIR into OUT_DIR (same file names).
    Deltas {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,
    },
    /// Filter a single delta file into OUT_DIR.
    File {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,
    },
    /// Keep the catalog rows whose TARGETID is listed in --ids; write them to --out.
    Catalog {
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,
        /// Output catalog path (gzip-compressed when it ends in .gz).
        #[arg(long, short)]
        out: PathBuf,
    },
}

/// Options shared by all subcommands. Values given here override `.datasplit.toml`.
#[derive(Clone, Args)]
pub struct CommonArgs {
    /// Target id list (text: one id per line; .json array; or .fits catalog TARGETID column).
    /// Selects identifier filtering.
    #[arg(long, short = 'i', global = true)]
    pub ids: Option<PathBuf>,

    /// Header field for threshold filtering, e.g. MEANSNR.
    #[arg(long, global = true)]
    pub field: Option<String>,

    /// Threshold value for --field.
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub value: Option<f64>,

    /// equal (==), below (<) or above (>=).
    #[arg(long, short = 'c', global = true)]
    pub criterion: Option<Comparison>,

    /// Worker count. Default: all available processing units.
    #[arg(long, short = 'j', global = true)]
    pub threads: Option<usize>,

    /// Write a JSON report of per-file outcomes to this path.
    #[arg(long, short = 'r', global = true)]
    pub report: Option<PathBuf>,

    /// Verbose output (debug logging and progress bar).
    #[arg(long, short = 'v', global = true, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

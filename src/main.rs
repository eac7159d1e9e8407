//! Datasplit CLI: filter delta files or a quasar catalog into a data-split subsample.

use anyhow::Result;
use clap::Parser;
use datasplit::engine::arg_parser::Cli;
use datasplit::engine::handle_run;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> Result<ExitCode> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    let all_ok = handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

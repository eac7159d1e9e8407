//! Engine module: CLI parsing, command handling, progress and path helpers

pub mod arg_parser;
pub mod cli;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{Cli, Commands, CommonArgs};
pub use cli::handle_run;
pub use tools::{glob_match, is_delta_file};

//! CLI command handlers
//!
//! Argument parsing structures, command routing and help output for the
//! `mapshuffle` binary.

pub mod args;
pub mod help;
pub mod router;

pub use args::{Cli, Commands};
pub use help::get_log_level;
pub use router::{execute_command, run_job, RunRequest};

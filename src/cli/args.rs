//! CLI argument structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run map/reduce jobs over a directory of input files
#[derive(Parser)]
#[command(name = "mapshuffle")]
#[command(about = "mapshuffle - Map/shuffle/reduce over local files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a job: one mapper per input file, NUM_REDUCERS reducers
    #[command(name = "run")]
    Run {
        /// Directory whose files are the job's input units
        input_dir: PathBuf,

        /// Directory receiving part-<n> output files
        output_dir: PathBuf,

        /// Number of reduce tasks (and output partitions)
        num_reducers: usize,

        /// Registered mapper name (see `mapshuffle list`)
        mapper: String,

        /// Registered reducer name (see `mapshuffle list`)
        reducer: String,

        /// Engine configuration file (TOML)
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Exit non-zero when any task failed or timed out
        #[arg(long)]
        strict: bool,

        /// Keep the shuffle store on disk after the job
        #[arg(long)]
        keep_intermediate: bool,

        /// Write the job report as JSON to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// List registered mappers and reducers
    #[command(name = "list")]
    List,
}

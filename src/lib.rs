//! # mapshuffle
//!
//! A single-machine map/shuffle/reduce engine. User map and reduce logic runs
//! in concurrent tasks that exchange data only through an on-disk shuffle
//! store, coordinated by completion and error marker files.
//!
//! ## Usage
//!
//! ```bash
//! mapshuffle run <input-dir> <output-dir> <num-reducers> <mapper> <reducer>
//! ```
//!
//! ## Modules
//!
//! - `cli` - Command line surface of the `mapshuffle` binary
//! - `config` - Engine tuning, loaded from TOML and `MAPSHUFFLE_*` variables
//! - `engine` - Map tasks, reduce tasks, shuffle store and orchestration
//! - `error` - Crate-wide error type
//! - `functions` - Mapper/reducer traits, built-ins and the name registry
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod functions;

pub use config::EngineConfig;
pub use engine::{Job, JobReport, Orchestrator};
pub use error::{Error, Result};
pub use functions::{FunctionRegistry, Mapper, Reducer};

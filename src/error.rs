use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Input directory {} contains no files", .0.display())]
    EmptyInput(PathBuf),

    #[error("Mapper not found: {0}")]
    MapperNotFound(String),

    #[error("Reducer not found: {0}")]
    ReducerNotFound(String),

    #[error("{failed} task(s) did not finish cleanly: {summary}")]
    TasksFailed { failed: usize, summary: String },
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error types for map and reduce tasks
//!
//! These never cross the task boundary as `Err`: the task turns them into an
//! outcome (and, for map tasks, an error marker).

use crate::functions::UserError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create marker in {dir}: {source}")]
    Marker {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("User function failed: {0}")]
    User(#[from] UserError),

    #[error("User function panicked: {0}")]
    Panic(String),
}

impl TaskError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Write {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure originated in user logic rather than the engine
    pub fn is_user_fault(&self) -> bool {
        matches!(self, TaskError::User(_) | TaskError::Panic(_))
    }
}

/// Result type for task internals
pub type TaskResult<T> = Result<T, TaskError>;

/// Run user logic, turning a panic into a [`TaskError::Panic`]
pub(crate) fn guard_user<T, F>(f: F) -> TaskResult<T>
where
    F: FnOnce() -> Result<T, UserError>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(TaskError::from),
        Err(payload) => Err(TaskError::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

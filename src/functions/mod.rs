//! User-supplied map and reduce logic
//!
//! The engine is generic over any [`Mapper`]/[`Reducer`] pair. Implementations
//! are injected directly when building a job, or looked up by name through the
//! [`FunctionRegistry`].

pub mod builtin;
pub mod registry;

use crate::engine::record::Emitter;

pub use builtin::{IdentityReducer, SumReducer, WordCountMapper};
pub use registry::FunctionRegistry;

/// Failure raised by user map or reduce logic
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("invalid value for key {key:?}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl UserError {
    pub fn other(message: impl Into<String>) -> Self {
        UserError::Other(message.into())
    }
}

/// Transforms one input line into zero or more records
pub trait Mapper: Send + Sync {
    fn map(&self, line: &str, emit: &mut dyn Emitter) -> Result<(), UserError>;
}

/// Aggregates every value seen for one key
///
/// Called once per key, keys in ascending order. Values coming from the same
/// mapper keep their emission order; order across mappers is unspecified.
pub trait Reducer: Send + Sync {
    fn reduce(&self, key: &str, values: &[String], emit: &mut dyn Emitter)
        -> Result<(), UserError>;
}

impl<F> Mapper for F
where
    F: Fn(&str, &mut dyn Emitter) -> Result<(), UserError> + Send + Sync,
{
    fn map(&self, line: &str, emit: &mut dyn Emitter) -> Result<(), UserError> {
        self(line, emit)
    }
}

impl<F> Reducer for F
where
    F: Fn(&str, &[String], &mut dyn Emitter) -> Result<(), UserError> + Send + Sync,
{
    fn reduce(
        &self,
        key: &str,
        values: &[String],
        emit: &mut dyn Emitter,
    ) -> Result<(), UserError> {
        self(key, values, emit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::record::{CollectingEmitter, Record};

    #[test]
    fn test_closure_as_mapper() {
        let upper = |line: &str, emit: &mut dyn Emitter| emit.emit(&line.to_uppercase(), "x");
        let mut emitter = CollectingEmitter::new();
        Mapper::map(&upper, "abc", &mut emitter).unwrap();
        assert_eq!(emitter.records(), &[Record::new("ABC", "x")]);
    }

    #[test]
    fn test_closure_as_reducer() {
        let count = |key: &str, values: &[String], emit: &mut dyn Emitter| {
            emit.emit(key, &values.len().to_string())
        };
        let mut emitter = CollectingEmitter::new();
        Reducer::reduce(&count, "k", &["a".into(), "b".into()], &mut emitter).unwrap();
        assert_eq!(emitter.records(), &[Record::new("k", "2")]);
    }
}

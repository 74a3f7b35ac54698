//! Built-in functions shipped with the engine

use super::{Mapper, Reducer, UserError};
use crate::engine::record::Emitter;

/// Emits `(word, "1")` for every whitespace-separated token
#[derive(Debug, Default, Clone, Copy)]
pub struct WordCountMapper;

impl Mapper for WordCountMapper {
    fn map(&self, line: &str, emit: &mut dyn Emitter) -> Result<(), UserError> {
        for word in line.split_whitespace() {
            emit.emit(word, "1")?;
        }
        Ok(())
    }
}

/// Sums integer values per key
#[derive(Debug, Default, Clone, Copy)]
pub struct SumReducer;

impl Reducer for SumReducer {
    fn reduce(
        &self,
        key: &str,
        values: &[String],
        emit: &mut dyn Emitter,
    ) -> Result<(), UserError> {
        let mut sum: i64 = 0;
        for value in values {
            let n: i64 = value
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| UserError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("{value:?}: {e}"),
                })?;
            sum = sum.checked_add(n).ok_or_else(|| UserError::InvalidValue {
                key: key.to_string(),
                reason: "sum overflows i64".to_string(),
            })?;
        }
        emit.emit(key, &sum.to_string())
    }
}

/// Re-emits every value unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityReducer;

impl Reducer for IdentityReducer {
    fn reduce(
        &self,
        key: &str,
        values: &[String],
        emit: &mut dyn Emitter,
    ) -> Result<(), UserError> {
        values.iter().try_for_each(|value| emit.emit(key, value))
    }
}

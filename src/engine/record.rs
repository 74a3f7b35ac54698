//! Records and the emitter capability
//!
//! A record is a `(key, value)` pair of strings. On disk every record is one
//! line, `key\tvalue`. Decoding splits on the first tab only, so a value may
//! itself contain tabs while a key may not.

use crate::functions::UserError;

/// Separator between key and value on a record line
pub const FIELD_SEPARATOR: char = '\t';

/// A single key/value pair produced by user logic
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encode as a line without the trailing newline
    pub fn to_line(&self) -> String {
        encode_line(&self.key, &self.value)
    }

    /// Decode a line, returning `None` when it has no separator
    pub fn from_line(line: &str) -> Option<Self> {
        split_line(line).map(|(key, value)| Self::new(key, value))
    }
}

/// Encode a key/value pair as `key\tvalue`
pub fn encode_line(key: &str, value: &str) -> String {
    let mut line = String::with_capacity(key.len() + value.len() + 1);
    line.push_str(key);
    line.push(FIELD_SEPARATOR);
    line.push_str(value);
    line
}

/// Split a line on its first tab
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    line.split_once(FIELD_SEPARATOR)
}

/// Callback through which user logic produces output records
///
/// The engine supplies one implementation per task: the map side routes each
/// pair to a partition, the reduce side appends it to the task's output file.
pub trait Emitter {
    fn emit(&mut self, key: &str, value: &str) -> Result<(), UserError>;
}

/// Emitter that keeps every record in memory
///
/// Used by the reduce task to collect one key's output before writing it, and
/// handy for exercising user functions in isolation.
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    records: Vec<Record>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Take the collected records, leaving the emitter empty
    pub fn drain(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }
}

impl Emitter for CollectingEmitter {
    fn emit(&mut self, key: &str, value: &str) -> Result<(), UserError> {
        self.records.push(Record::new(key, value));
        Ok(())
    }
}

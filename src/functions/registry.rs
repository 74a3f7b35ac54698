//! Name-keyed factory for mapper and reducer implementations

use super::builtin::{IdentityReducer, SumReducer, WordCountMapper};
use super::{Mapper, Reducer};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

type MapperFactory = Box<dyn Fn() -> Arc<dyn Mapper> + Send + Sync>;
type ReducerFactory = Box<dyn Fn() -> Arc<dyn Reducer> + Send + Sync>;

/// Registry resolving function names to implementations
///
/// `FunctionRegistry::default()` contains the built-ins. Callers embedding the
/// engine can register their own functions under any name.
pub struct FunctionRegistry {
    mappers: BTreeMap<String, MapperFactory>,
    reducers: BTreeMap<String, ReducerFactory>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    /// Create a registry with nothing registered
    pub fn empty() -> Self {
        Self {
            mappers: BTreeMap::new(),
            reducers: BTreeMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_mapper("word-count", || Arc::new(WordCountMapper));
        registry.register_mapper("WordCountMapper", || Arc::new(WordCountMapper));
        registry.register_reducer("sum", || Arc::new(SumReducer));
        registry.register_reducer("WordCountReducer", || Arc::new(SumReducer));
        registry.register_reducer("identity", || Arc::new(IdentityReducer));
        registry
    }

    pub fn register_mapper<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Mapper> + Send + Sync + 'static,
    {
        self.mappers.insert(name.into(), Box::new(factory));
    }

    pub fn register_reducer<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Reducer> + Send + Sync + 'static,
    {
        self.reducers.insert(name.into(), Box::new(factory));
    }

    pub fn mapper(&self, name: &str) -> Result<Arc<dyn Mapper>> {
        self.mappers
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::MapperNotFound(name.to_string()))
    }

    pub fn reducer(&self, name: &str) -> Result<Arc<dyn Reducer>> {
        self.reducers
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::ReducerNotFound(name.to_string()))
    }

    /// Registered mapper names in sorted order
    pub fn mapper_names(&self) -> Vec<&str> {
        self.mappers.keys().map(String::as_str).collect()
    }

    /// Registered reducer names in sorted order
    pub fn reducer_names(&self) -> Vec<&str> {
        self.reducers.keys().map(String::as_str).collect()
    }
}

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod loader;

pub use loader::ConfigLoader;

/// Tuning knobs for the execution engine
///
/// Every field has a default, so an empty TOML file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Records buffered per partition before a map task writes them out
    pub buffer_size: usize,

    /// Pause between full discovery passes of a reduce task
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Pause after a failed directory listing
    #[serde(with = "humantime_serde")]
    pub list_retry_interval: Duration,

    /// Retry ceiling per reducer is `mappers * retry_factor`
    pub retry_factor: usize,

    /// Parent directory for the shuffle store (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,

    /// Name prefix of the shuffle store directory
    pub temp_prefix: String,

    /// Leave the shuffle store in place after the job
    pub keep_intermediate: bool,

    /// Fail the job when any task failed or timed out
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            poll_interval: Duration::from_secs(1),
            list_retry_interval: Duration::from_millis(500),
            retry_factor: default_retry_factor(),
            temp_dir: None,
            temp_prefix: "mapreduce".to_string(),
            keep_intermediate: false,
            strict: false,
        }
    }
}

fn default_buffer_size() -> usize {
    1000
}

fn default_retry_factor() -> usize {
    5
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `MAPSHUFFLE_*` environment overrides
    pub fn merge_env_vars(&mut self) -> Result<()> {
        self.merge_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn merge_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("MAPSHUFFLE_BUFFER_SIZE") {
            self.buffer_size = parse_env("MAPSHUFFLE_BUFFER_SIZE", &value)?;
        }

        if let Some(value) = lookup("MAPSHUFFLE_POLL_INTERVAL") {
            self.poll_interval = humantime_serde::re::humantime::parse_duration(&value)
                .map_err(|e| Error::Config(format!("MAPSHUFFLE_POLL_INTERVAL={value}: {e}")))?;
        }

        if let Some(value) = lookup("MAPSHUFFLE_RETRY_FACTOR") {
            self.retry_factor = parse_env("MAPSHUFFLE_RETRY_FACTOR", &value)?;
        }

        if let Some(value) = lookup("MAPSHUFFLE_TEMP_DIR") {
            self.temp_dir = Some(PathBuf::from(value));
        }

        if let Some(value) = lookup("MAPSHUFFLE_STRICT") {
            self.strict = parse_env("MAPSHUFFLE_STRICT", &value)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Config("buffer_size must be greater than 0".into()));
        }
        if self.retry_factor == 0 {
            return Err(Error::Config("retry_factor must be greater than 0".into()));
        }
        if self.temp_prefix.is_empty() {
            return Err(Error::Config("temp_prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Retry ceiling for a reduce task waiting on `mappers` map tasks
    pub fn max_retries(&self, mappers: usize) -> usize {
        mappers.saturating_mul(self.retry_factor)
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name}={value}: {e}")))
}

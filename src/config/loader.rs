use super::EngineConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Resolves the effective engine configuration
///
/// Precedence, lowest first: built-in defaults, the TOML file, `MAPSHUFFLE_*`
/// environment variables. CLI flags are applied by the caller on top.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Ignore environment overrides
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub async fn load(&self) -> Result<EngineConfig> {
        let mut config = match &self.path {
            Some(path) => Self::load_file(path).await?,
            None => EngineConfig::default(),
        };

        if !self.skip_env {
            config.merge_env_vars()?;
        }

        config.validate()?;
        Ok(config)
    }

    async fn load_file(path: &Path) -> Result<EngineConfig> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }

        debug!("Loading engine configuration from {}", path.display());
        let content = fs::read_to_string(path).await?;
        EngineConfig::from_toml(&content)
    }
}

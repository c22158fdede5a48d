use super::EngineConfig;
use crate::engine::errors::{AggregationError, AggregationResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Builds an [`EngineConfig`] from defaults, an optional TOML file and the
/// environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            path: None,
            use_env: true,
        }
    }

    /// Read settings from this TOML file; a missing file is an error
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Skip the `CHUNKAGG_*` environment overlay
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load and validate
    pub async fn load(&self) -> AggregationResult<EngineConfig> {
        let config = self.load_unvalidated().await?;
        config.validate()?;
        debug!("Loaded engine configuration: {:?}", config);
        Ok(config)
    }

    /// Layer file and environment without validating the result
    ///
    /// For callers that still apply overrides of their own: a setting that is
    /// invalid here may be replaced before [`EngineConfig::validate`] runs.
    pub async fn load_unvalidated(&self) -> AggregationResult<EngineConfig> {
        let mut config = match &self.path {
            Some(path) => Self::load_file(path).await?,
            None => EngineConfig::default(),
        };

        if self.use_env {
            config.merge_env_vars()?;
        }

        Ok(config)
    }

    async fn load_file(path: &Path) -> AggregationResult<EngineConfig> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| AggregationError::ConfigLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
                source: Some(Box::new(e)),
            })?;

        Self::parse(&content, path)
    }

    /// Parse TOML content, attributing errors to `path`
    pub fn parse(content: &str, path: &Path) -> AggregationResult<EngineConfig> {
        toml::from_str(content).map_err(|e| AggregationError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
            source: Some(Box::new(e)),
        })
    }
}

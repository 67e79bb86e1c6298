//! Application configuration
//!
//! One YAML file holds the pipeline sections plus an optional `server`
//! section. A missing file means defaults.

use sentimo_core::{Error, PipelineConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub pipeline: PipelineConfig,

    /// Serving settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from file, or use defaults when it does not exist
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path).map_err(|e| {
                Error::config(format!("failed to read {}: {e}", config_path.display()))
            })?;
            let config = Self::from_yaml(&content)?;
            debug!("Loaded configuration from {}", config_path.display());
            config
        } else {
            debug!(
                "{} not found, using default configuration",
                config_path.display()
            );
            Self::default()
        };
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.server.validate()
    }

    /// Apply command-line overrides
    pub fn with_overrides(
        mut self,
        registry: Option<PathBuf>,
        experiment: Option<String>,
    ) -> Result<Self> {
        if let Some(root) = registry {
            self.pipeline.registry.root = root;
        }
        if let Some(experiment) = experiment {
            self.pipeline.registry.experiment = experiment;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Serving configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::config("server.request_timeout_ms must be > 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

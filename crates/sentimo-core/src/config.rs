//! Pipeline configuration
//!
//! The YAML layout follows the sectioned parameter file used by the
//! training pipeline:
//!
//! ```yaml
//! feature_engineering:
//!   vocab_size: 5000
//! data_split:
//!   test_size: 0.2
//!   seed: 42
//! training:
//!   n_estimators: 100
//!   random_state: 42
//! registry:
//!   root: ./registry
//!   experiment: IMDB
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Full configuration for one pipeline execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Vectorizer settings
    #[serde(default)]
    pub feature_engineering: FeatureConfig,

    /// Train/test split settings
    #[serde(default)]
    pub data_split: SplitConfig,

    /// Classifier hyperparameters
    #[serde(default)]
    pub training: TrainingConfig,

    /// Where runs and artifacts live
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Optional metrics report output
    #[serde(default)]
    pub report: ReportConfig,
}

/// Feature engineering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Maximum vocabulary size of the fitted transform
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
}

/// Train/test split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for evaluation, in (0, 1)
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Shuffle seed
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of trees in the ensemble
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Base seed; tree `i` uses `random_state + i`
    #[serde(default = "default_seed")]
    pub random_state: u64,

    /// Maximum tree depth (unbounded when absent)
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Run registry location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Root directory for runs, artifacts and the promoted pointer
    #[serde(default = "default_registry_root")]
    pub root: PathBuf,

    /// Experiment name runs are recorded under
    #[serde(default = "default_experiment")]
    pub experiment: String,
}

/// Metrics report output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Write the metrics record of each run to this JSON file
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid pipeline config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml(&content)?;
        debug!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Reject configurations that cannot produce a valid run
    pub fn validate(&self) -> Result<()> {
        self.feature_engineering.validate()?;
        self.data_split.validate()?;
        self.training.validate()?;

        if self.registry.experiment.trim().is_empty() {
            return Err(Error::config("registry.experiment must not be empty"));
        }

        Ok(())
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(Error::config("vocab_size must be > 0"));
        }
        Ok(())
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        // NaN fails both comparisons
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(Error::config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        Ok(())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::config("n_estimators must be > 0"));
        }
        if self.max_depth == Some(0) {
            return Err(Error::config("max_depth must be > 0 when set"));
        }
        Ok(())
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            vocab_size: default_vocab_size(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            seed: default_seed(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            random_state: default_seed(),
            max_depth: None,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root: default_registry_root(),
            experiment: default_experiment(),
        }
    }
}

fn default_vocab_size() -> usize {
    5000
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_n_estimators() -> usize {
    100
}

fn default_registry_root() -> PathBuf {
    PathBuf::from("./registry")
}

fn default_experiment() -> String {
    "IMDB".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_yaml() {
        let yaml = r#"
feature_engineering:
  vocab_size: 3000

data_split:
  test_size: 0.25
  seed: 7

training:
  n_estimators: 50
  random_state: 11
  max_depth: 12

registry:
  root: ./my-registry
  experiment: reviews

report:
  metrics_path: ./reports/metrics.json
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.feature_engineering.vocab_size, 3000);
        assert_eq!(config.data_split.test_size, 0.25);
        assert_eq!(config.data_split.seed, 7);
        assert_eq!(config.training.n_estimators, 50);
        assert_eq!(config.training.max_depth, Some(12));
        assert_eq!(config.registry.root, PathBuf::from("./my-registry"));
        assert_eq!(config.registry.experiment, "reviews");
        assert_eq!(
            config.report.metrics_path,
            Some(PathBuf::from("./reports/metrics.json"))
        );
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = PipelineConfig::from_yaml("training:\n  n_estimators: 10\n").unwrap();
        assert_eq!(config.feature_engineering.vocab_size, 5000);
        assert_eq!(config.data_split.test_size, 0.2);
        assert_eq!(config.training.random_state, 42);
        assert_eq!(config.registry.experiment, "IMDB");
    }

    #[test]
    fn test_rejects_zero_vocab() {
        let err = PipelineConfig::from_yaml("feature_engineering:\n  vocab_size: 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_negative_vocab() {
        let err = PipelineConfig::from_yaml("feature_engineering:\n  vocab_size: -5\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_test_size_out_of_range() {
        for bad in ["0.0", "1.0", "1.5", "-0.1"] {
            let yaml = format!("data_split:\n  test_size: {bad}\n");
            let err = PipelineConfig::from_yaml(&yaml).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "accepted test_size {bad}");
        }
    }

    #[test]
    fn test_rejects_zero_estimators() {
        let err = PipelineConfig::from_yaml("training:\n  n_estimators: 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("params.yaml");
        std::fs::write(&path, "feature_engineering:\n  vocab_size: 10\n").unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.feature_engineering.vocab_size, 10);

        let missing = PipelineConfig::from_file(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(missing, Error::Config(_)));
    }
}

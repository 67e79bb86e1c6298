//! Batch training pipeline
//!
//! corpus -> features -> classifier -> metrics -> run record -> (promotion)
//!
//! Each stage's error is wrapped in a [`StageError`] naming the stage, so
//! a failed execution reports where it stopped.

use sentimo_core::{ArtifactRef, CorpusRecord, MetricsRecord, PipelineConfig};
use sentimo_model::{evaluate, ClassifierTrainer, CorpusLoader, FeatureEngineer};
use sentimo_registry::{PromotionOutcome, Run, RunRegistry};
use serde_json::json;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Load,
    FeatureEngineering,
    Training,
    Evaluation,
    Report,
    Registration,
    Promotion,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Load => "load",
            Self::FeatureEngineering => "feature engineering",
            Self::Training => "training",
            Self::Evaluation => "evaluation",
            Self::Report => "report",
            Self::Registration => "registration",
            Self::Promotion => "promotion",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline failure, tagged with the stage that raised it
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: sentimo_core::Error,
}

trait StageResultExt<T> {
    fn stage(self, stage: Stage) -> Result<T, StageError>;
}

impl<T> StageResultExt<T> for sentimo_core::Result<T> {
    fn stage(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|source| StageError { stage, source })
    }
}

/// What one execution produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub transform: ArtifactRef,
    pub classifier: ArtifactRef,
    pub metrics: MetricsRecord,
    /// Best run promoted afterwards, when promotion was requested
    pub promoted: Option<(Run, PromotionOutcome)>,
}

pub struct TrainingPipeline {
    config: PipelineConfig,
    registry: Arc<RunRegistry>,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig, registry: Arc<RunRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load a CSV corpus and run every stage on it
    pub fn run(&self, corpus_path: &Path, promote: bool) -> Result<PipelineOutcome, StageError> {
        self.config.validate().stage(Stage::Configuration)?;
        let corpus = CorpusLoader::new()
            .and_then(|loader| loader.load(corpus_path))
            .stage(Stage::Load)?;
        info!(
            "Loaded {} records from {}",
            corpus.len(),
            corpus_path.display()
        );
        self.execute(&corpus, Some(corpus_path), promote)
    }

    /// Run every stage on an in-memory corpus
    pub fn run_on(
        &self,
        corpus: &[CorpusRecord],
        promote: bool,
    ) -> Result<PipelineOutcome, StageError> {
        self.config.validate().stage(Stage::Configuration)?;
        self.execute(corpus, None, promote)
    }

    fn execute(
        &self,
        corpus: &[CorpusRecord],
        source: Option<&Path>,
        promote: bool,
    ) -> Result<PipelineOutcome, StageError> {
        let start = Instant::now();
        let config = &self.config;
        let store = self.registry.artifacts();

        let features = FeatureEngineer::new(store.clone())
            .fit_transform(
                corpus,
                config.feature_engineering.vocab_size,
                config.data_split.test_size,
                config.data_split.seed,
            )
            .stage(Stage::FeatureEngineering)?;

        let trained = ClassifierTrainer::new(store)
            .fit(&features.train, &config.training)
            .stage(Stage::Training)?;

        let metrics = evaluate(&trained.model, &features.test).stage(Stage::Evaluation)?;

        if let Some(path) = &config.report.metrics_path {
            write_report(path, &metrics).stage(Stage::Report)?;
        }

        let hyperparams = json!({
            "vocab_size": config.feature_engineering.vocab_size,
            "test_size": config.data_split.test_size,
            "split_seed": config.data_split.seed,
            "n_estimators": config.training.n_estimators,
            "random_state": config.training.random_state,
            "max_depth": config.training.max_depth,
        });
        let mut run = Run::new(
            config.registry.experiment.clone(),
            features.transform_ref.clone(),
            trained.classifier_ref.clone(),
            metrics,
        )
        .with_hyperparams(hyperparams)
        .with_description("TF-IDF + random forest sentiment workflow")
        .with_tag("labels", r#"["RandomForestClassifier","classification"]"#)
        .with_tag("meta", json!({ "framework": "sentimo-model" }).to_string())
        .with_tag("train_rows", features.train.len().to_string())
        .with_tag("test_rows", features.test.len().to_string());
        if let Some(path) = source {
            run = run.with_tag("corpus", path.display().to_string());
        }
        let run_id = self.registry.append_run(run).stage(Stage::Registration)?;

        let promoted = if promote {
            Some(
                self.registry
                    .promote_best(&config.registry.experiment)
                    .stage(Stage::Promotion)?,
            )
        } else {
            None
        };

        info!(
            "Pipeline finished in {:?}: run {} accuracy {:.4}",
            start.elapsed(),
            run_id,
            metrics.accuracy
        );

        Ok(PipelineOutcome {
            run_id,
            transform: features.transform_ref,
            classifier: trained.classifier_ref,
            metrics,
            promoted,
        })
    }
}

fn write_report(path: &Path, metrics: &MetricsRecord) -> sentimo_core::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(metrics)?)?;
    info!("Wrote metrics report to {}", path.display());
    Ok(())
}

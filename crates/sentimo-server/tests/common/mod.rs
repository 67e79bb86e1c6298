#![allow(dead_code)]

use sentimo_core::{CorpusRecord, PipelineConfig};
use sentimo_registry::RunRegistry;
use sentimo_server::{PipelineOutcome, TrainingPipeline};
use std::sync::Arc;
use tempfile::TempDir;

pub fn corpus() -> Vec<CorpusRecord> {
    let mut records = Vec::new();
    for subject in [
        "movie", "film", "plot", "cast", "ending", "script", "story", "score", "acting", "music",
    ] {
        records.push(CorpusRecord::positive(format!("the {subject} was great")));
        records.push(CorpusRecord::negative(format!("the {subject} was terrible")));
    }
    records
}

pub fn config(dir: &TempDir, seed: u64) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.feature_engineering.vocab_size = 50;
    config.data_split.test_size = 0.2;
    config.data_split.seed = seed;
    config.training.n_estimators = 15;
    config.training.random_state = seed;
    config.registry.root = dir.path().join("registry");
    config
}

pub fn registry(dir: &TempDir) -> Arc<RunRegistry> {
    Arc::new(RunRegistry::open(dir.path().join("registry")).unwrap())
}

/// Train one run and optionally promote the experiment's best
pub fn train(dir: &TempDir, registry: &Arc<RunRegistry>, seed: u64, promote: bool) -> PipelineOutcome {
    TrainingPipeline::new(config(dir, seed), registry.clone())
        .run_on(&corpus(), promote)
        .unwrap()
}

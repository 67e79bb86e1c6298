//! Run registry: record runs, select the best, promote it

use crate::history::{PromotionLog, PromotionRecord};
use crate::pointer::{self, PromotedPair};
use crate::runs::{compare_runs, select_best_of, validate_experiment, FsRunStore, Run, RunStore};
use crate::store::FsArtifactStore;
use parking_lot::Mutex;
use sentimo_core::{ArtifactRef, ArtifactStore, Error, MetricsRecord, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a promotion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The pointer now names the run
    Promoted,
    /// The run was already current; nothing was written
    AlreadyCurrent,
}

/// The current pair together with both artifact blobs
#[derive(Debug, Clone)]
pub struct LoadedPair {
    pub pair: PromotedPair,
    pub transform: Vec<u8>,
    pub classifier: Vec<u8>,
}

/// Registry rooted at one directory:
///
/// ```text
/// <root>/artifacts/<kind>/<digest>.json
/// <root>/runs/<experiment>/<run_id>.json
/// <root>/current.json
/// <root>/promotions.jsonl
/// ```
pub struct RunRegistry {
    root: PathBuf,
    runs: Arc<dyn RunStore>,
    artifacts: Arc<dyn ArtifactStore>,
    history: PromotionLog,
    promote_lock: Mutex<()>,
}

impl RunRegistry {
    /// Open (and create if needed) a filesystem registry
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let runs = Arc::new(FsRunStore::new(root.join("runs"))?);
        let artifacts = Arc::new(FsArtifactStore::new(root.join("artifacts"))?);
        debug!("Opened run registry at {}", root.display());
        Ok(Self::with_stores(root, runs, artifacts))
    }

    /// Registry over custom stores; the pointer and log still live in `root`
    pub fn with_stores(
        root: impl Into<PathBuf>,
        runs: Arc<dyn RunStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        let root = root.into();
        Self {
            history: PromotionLog::new(root.join("promotions.jsonl")),
            root,
            runs,
            artifacts,
            promote_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact store shared with the training stages
    pub fn artifacts(&self) -> Arc<dyn ArtifactStore> {
        self.artifacts.clone()
    }

    fn pointer_path(&self) -> PathBuf {
        self.root.join("current.json")
    }

    /// Record a new run and return its id
    pub fn record_run(
        &self,
        experiment: &str,
        transform: ArtifactRef,
        classifier: ArtifactRef,
        metrics: MetricsRecord,
        hyperparams: serde_json::Value,
    ) -> Result<String> {
        let run = Run::new(experiment, transform, classifier, metrics).with_hyperparams(hyperparams);
        self.append_run(run)
    }

    /// Record a fully built run
    pub fn append_run(&self, run: Run) -> Result<String> {
        run.validate()?;
        for artifact in [&run.transform, &run.classifier] {
            if !self.artifacts.contains(artifact) {
                return Err(Error::artifact(format!(
                    "run references unknown artifact {artifact}"
                )));
            }
        }

        self.runs.append(&run)?;
        metrics::counter!("sentimo_runs_recorded_total").increment(1);

        info!(
            "Recorded run {} in experiment '{}' (accuracy {:.4})",
            run.run_id, run.experiment, run.metrics.accuracy
        );
        Ok(run.run_id)
    }

    /// Runs of an experiment, best first
    pub fn list_runs(&self, experiment: &str) -> Result<Vec<Run>> {
        let mut runs = self.runs.list(experiment)?;
        runs.sort_by(compare_runs);
        Ok(runs)
    }

    pub fn get_run(&self, experiment: &str, run_id: &str) -> Result<Option<Run>> {
        self.runs.get(experiment, run_id)
    }

    /// Best run of an experiment
    pub fn select_best(&self, experiment: &str) -> Result<Run> {
        validate_experiment(experiment)?;
        let runs = self.runs.list(experiment)?;
        select_best_of(&runs)
            .cloned()
            .ok_or_else(|| Error::NoRuns(experiment.to_string()))
    }

    /// Publish `run`'s artifacts as the current pair
    pub fn promote(&self, run: &Run) -> Result<PromotionOutcome> {
        let _guard = self.promote_lock.lock();
        self.promote_locked(run)
    }

    /// Select the best run and promote it under one lock
    pub fn promote_best(&self, experiment: &str) -> Result<(Run, PromotionOutcome)> {
        let _guard = self.promote_lock.lock();
        let best = self.select_best(experiment)?;
        let outcome = self.promote_locked(&best)?;
        Ok((best, outcome))
    }

    fn promote_locked(&self, run: &Run) -> Result<PromotionOutcome> {
        run.validate()?;

        if let Some(current) = pointer::read(&self.pointer_path())? {
            if current.is_run(run) {
                debug!("Run {} is already promoted", run.run_id);
                return Ok(PromotionOutcome::AlreadyCurrent);
            }
        }

        for artifact in [&run.transform, &run.classifier] {
            if !self.artifacts.contains(artifact) {
                return Err(Error::artifact(format!(
                    "cannot promote run {}: artifact {artifact} is missing",
                    run.run_id
                )));
            }
        }

        let pair = PromotedPair::from_run(run);
        pointer::write(&self.pointer_path(), &pair)?;

        // The pointer is authoritative: once it is replaced the run is live.
        if let Err(e) = self.history.append(&pair) {
            metrics::counter!("sentimo_history_append_failures_total").increment(1);
            warn!(
                "Run {} is promoted but its history record was not written: {}",
                run.run_id, e
            );
        }

        info!(
            "Promoted run {} (accuracy {:.4}): transform {}, classifier {}",
            run.run_id, pair.accuracy, pair.transform.digest, pair.classifier.digest
        );
        Ok(PromotionOutcome::Promoted)
    }

    /// The current pointer, if anything was promoted
    pub fn current(&self) -> Result<Option<PromotedPair>> {
        pointer::read(&self.pointer_path())
    }

    /// The current pair with both blobs, verified against their digests
    pub fn load_current(&self) -> Result<LoadedPair> {
        let pair = self
            .current()
            .map_err(|e| Error::model_unavailable(e.to_string()))?
            .ok_or_else(|| Error::model_unavailable("no model has been promoted"))?;

        let fetch = |artifact: &ArtifactRef| {
            self.artifacts
                .get(artifact)
                .map_err(|e| Error::model_unavailable(e.to_string()))
        };
        let transform = fetch(&pair.transform)?;
        let classifier = fetch(&pair.classifier)?;

        Ok(LoadedPair {
            pair,
            transform,
            classifier,
        })
    }

    /// Past promotions, oldest first
    pub fn promotion_history(&self) -> Result<Vec<PromotionRecord>> {
        self.history.read_all()
    }

    /// Whether the promotion log's hash chain is intact
    pub fn verify_history(&self) -> Result<bool> {
        self.history.verify()
    }
}

//! Runs and run storage

use crate::atomic;
use chrono::{DateTime, Utc};
use sentimo_core::{ArtifactRef, Error, MetricsRecord, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One recorded training execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Unique id (`run_<uuid>`)
    pub run_id: String,

    /// Experiment the run belongs to
    pub experiment: String,

    /// When the run was recorded
    pub timestamp: DateTime<Utc>,

    /// Fitted transform
    pub transform: ArtifactRef,

    /// Classifier trained on that transform's features
    pub classifier: ArtifactRef,

    /// Held-out metrics
    pub metrics: MetricsRecord,

    /// Hyperparameters the run was produced with
    #[serde(default)]
    pub hyperparams: serde_json::Value,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form tags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

fn generate_run_id() -> String {
    format!("run_{}", uuid::Uuid::new_v4().simple())
}

impl Run {
    /// New run with a fresh id, stamped with the current time
    pub fn new(
        experiment: impl Into<String>,
        transform: ArtifactRef,
        classifier: ArtifactRef,
        metrics: MetricsRecord,
    ) -> Self {
        Self {
            run_id: generate_run_id(),
            experiment: experiment.into(),
            timestamp: Utc::now(),
            transform,
            classifier,
            metrics,
            hyperparams: serde_json::Value::Null,
            description: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_hyperparams(mut self, hyperparams: serde_json::Value) -> Self {
        self.hyperparams = hyperparams;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Override the recording time (imports, replays)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }

    /// Reject runs that could never be compared or stored
    pub fn validate(&self) -> Result<()> {
        validate_experiment(&self.experiment)?;
        validate_name("run id", &self.run_id)?;

        let accuracy = self.metrics.accuracy;
        if !(0.0..=1.0).contains(&accuracy) {
            return Err(Error::evaluation(format!(
                "accuracy must be in [0, 1], got {accuracy}"
            )));
        }
        Ok(())
    }
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if bad {
        return Err(Error::config(format!("invalid {what} '{name}'")));
    }
    Ok(())
}

/// Experiment names double as directory names
pub fn validate_experiment(experiment: &str) -> Result<()> {
    validate_name("experiment name", experiment)
}

/// Ranking used for best-run selection; `Less` means `a` ranks first.
///
/// Higher accuracy wins; equal accuracy goes to the more recent run, and a
/// remaining tie to the greater run id, so the order is total.
pub fn compare_runs(a: &Run, b: &Run) -> Ordering {
    b.metrics
        .accuracy
        .total_cmp(&a.metrics.accuracy)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
        .then_with(|| b.run_id.cmp(&a.run_id))
}

/// Best run of a set, if any
pub fn select_best_of(runs: &[Run]) -> Option<&Run> {
    let mut ranked: Vec<&Run> = runs.iter().collect();
    ranked.sort_by(|a, b| compare_runs(a, b));
    ranked.first().copied()
}

/// Append-only run persistence
pub trait RunStore: Send + Sync {
    /// Store a new run. Fails if a run with the same id already exists.
    fn append(&self, run: &Run) -> Result<()>;

    /// All runs of an experiment, in no particular order
    fn list(&self, experiment: &str) -> Result<Vec<Run>>;

    /// One run by id
    fn get(&self, experiment: &str, run_id: &str) -> Result<Option<Run>>;
}

/// One JSON document per run under `<root>/<experiment>/<run_id>.json`
#[derive(Debug, Clone)]
pub struct FsRunStore {
    root: PathBuf,
}

impl FsRunStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_path(&self, experiment: &str, run_id: &str) -> PathBuf {
        self.root.join(experiment).join(format!("{run_id}.json"))
    }
}

impl RunStore for FsRunStore {
    fn append(&self, run: &Run) -> Result<()> {
        run.validate()?;
        let path = self.run_path(&run.experiment, &run.run_id);
        atomic::create_json(&path, run).map_err(|e| match e {
            Error::Io(io) if io.kind() == std::io::ErrorKind::AlreadyExists => {
                Error::internal(format!("run {} already recorded", run.run_id))
            }
            other => other,
        })
    }

    fn list(&self, experiment: &str) -> Result<Vec<Run>> {
        validate_experiment(experiment)?;
        let dir = self.root.join(experiment);

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let path = entry?.path();

            // Skips in-flight temp files as well
            let is_run = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with('.'));
            if !is_run {
                continue;
            }

            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Run>(&content) {
                Ok(run) => runs.push(run),
                Err(e) => warn!("Skipping unreadable run document {:?}: {}", path, e),
            }
        }

        Ok(runs)
    }

    fn get(&self, experiment: &str, run_id: &str) -> Result<Option<Run>> {
        validate_experiment(experiment)?;
        validate_name("run id", run_id)?;

        match std::fs::read_to_string(self.run_path(experiment, run_id)) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sentimo_core::ArtifactKind;
    use tempfile::TempDir;

    fn refs(tag: &str) -> (ArtifactRef, ArtifactRef) {
        (
            ArtifactRef::for_bytes(ArtifactKind::Transform, tag.as_bytes()),
            ArtifactRef::for_bytes(ArtifactKind::Classifier, tag.as_bytes()),
        )
    }

    fn run(accuracy: f64, secs: i64) -> Run {
        let (t, c) = refs(&format!("{accuracy}-{secs}"));
        Run::new("IMDB", t, c, MetricsRecord::with_accuracy(accuracy))
            .with_timestamp(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = run(0.5, 0);
        let b = run(0.5, 0);
        assert_ne!(a.run_id, b.run_id);
        assert!(a.run_id.starts_with("run_"));
    }

    #[test]
    fn test_best_by_accuracy_then_recency() {
        let runs = vec![run(0.80, 1), run(0.91, 2), run(0.91, 3)];
        let best = select_best_of(&runs).unwrap();
        assert_eq!(best.run_id, runs[2].run_id);
    }

    #[test]
    fn test_higher_accuracy_beats_recency() {
        let runs = vec![run(0.95, 1), run(0.90, 5)];
        assert_eq!(select_best_of(&runs).unwrap().run_id, runs[0].run_id);
    }

    #[test]
    fn test_residual_tie_broken_by_run_id() {
        let mut a = run(0.9, 1);
        let mut b = run(0.9, 1);
        a.run_id = "run_a".to_string();
        b.run_id = "run_b".to_string();

        let runs = vec![a.clone(), b.clone()];
        assert_eq!(select_best_of(&runs).unwrap().run_id, "run_b");
        let reversed = vec![b, a];
        assert_eq!(select_best_of(&reversed).unwrap().run_id, "run_b");
    }

    #[test]
    fn test_empty_has_no_best() {
        assert!(select_best_of(&[]).is_none());
    }

    #[test]
    fn test_validate() {
        assert!(run(0.5, 0).validate().is_ok());
        assert!(run(1.5, 0).validate().is_err());
        assert!(run(f64::NAN, 0).validate().is_err());

        let mut bad = run(0.5, 0);
        bad.experiment = "../escape".to_string();
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_fs_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FsRunStore::new(dir.path()).unwrap();

        let recorded = run(0.8, 0)
            .with_description("baseline")
            .with_tag("dataset", "imdb")
            .with_hyperparams(serde_json::json!({"n_estimators": 100}));
        store.append(&recorded).unwrap();

        let listed = store.list("IMDB").unwrap();
        assert_eq!(listed, vec![recorded.clone()]);
        assert_eq!(store.get("IMDB", &recorded.run_id).unwrap(), Some(recorded));
        assert_eq!(store.get("IMDB", "run_missing").unwrap(), None);
        assert!(store.list("other").unwrap().is_empty());
    }

    #[test]
    fn test_fs_store_is_append_only() {
        let dir = TempDir::new().unwrap();
        let store = FsRunStore::new(dir.path()).unwrap();

        let recorded = run(0.8, 0);
        store.append(&recorded).unwrap();

        let mut rewritten = recorded.clone();
        rewritten.metrics = MetricsRecord::with_accuracy(0.99);
        assert!(store.append(&rewritten).is_err());
        assert_eq!(store.list("IMDB").unwrap(), vec![recorded]);
    }

    #[test]
    fn test_fs_store_skips_corrupt_documents() {
        let dir = TempDir::new().unwrap();
        let store = FsRunStore::new(dir.path()).unwrap();
        store.append(&run(0.8, 0)).unwrap();
        std::fs::write(dir.path().join("IMDB").join("run_broken.json"), "{not json").unwrap();

        assert_eq!(store.list("IMDB").unwrap().len(), 1);
    }
}

//! The promoted-pair pointer document

use crate::atomic;
use crate::runs::Run;
use chrono::{DateTime, Utc};
use sentimo_core::{ArtifactRef, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The single current (transform, classifier) pair
///
/// Both halves always come from the run named by `run_id`; the document is
/// only ever replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotedPair {
    pub run_id: String,
    pub experiment: String,
    pub transform: ArtifactRef,
    pub classifier: ArtifactRef,
    pub accuracy: f64,
    pub promoted_at: DateTime<Utc>,
}

impl PromotedPair {
    pub fn from_run(run: &Run) -> Self {
        Self {
            run_id: run.run_id.clone(),
            experiment: run.experiment.clone(),
            transform: run.transform.clone(),
            classifier: run.classifier.clone(),
            accuracy: run.metrics.accuracy,
            promoted_at: Utc::now(),
        }
    }

    /// Whether this pointer already publishes exactly `run`'s artifacts
    pub fn is_run(&self, run: &Run) -> bool {
        self.run_id == run.run_id
            && self.transform == run.transform
            && self.classifier == run.classifier
    }
}

/// Read the pointer; `None` when nothing has been promoted yet
pub fn read(path: &Path) -> Result<Option<PromotedPair>> {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::artifact(format!("corrupt promotion pointer: {e}"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Atomically replace the pointer
pub fn write(path: &Path, pair: &PromotedPair) -> Result<()> {
    atomic::replace_json(path, pair)
}

//! Classifier training

use crate::artifact::Artifact;
use crate::forest::RandomForest;
use crate::split::{SparseVector, Split};
use sentimo_core::{ArtifactKind, ArtifactRef, ArtifactStore, Error, Label, Result, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Persisted classifier: a random forest stamped with the transform it was
/// trained against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    /// Digest of the transform whose features this model consumes
    pub transform_id: String,

    /// Hyperparameters used for training
    pub params: TrainingConfig,

    /// Number of training rows
    pub trained_on: usize,

    /// The fitted ensemble
    pub forest: RandomForest,
}

impl ForestModel {
    pub fn n_features(&self) -> usize {
        self.forest.n_features()
    }

    pub fn predict(&self, row: &SparseVector) -> Label {
        self.forest.predict(row)
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, row: &SparseVector) -> f32 {
        self.forest.predict_proba(row)
    }

    /// Whether this model consumes features of the given transform
    pub fn is_compatible_with(&self, transform_id: &str) -> bool {
        self.transform_id == transform_id
    }
}

impl Artifact for ForestModel {
    const KIND: ArtifactKind = ArtifactKind::Classifier;

    fn restore(self) -> Result<Self> {
        if self.transform_id.is_empty() {
            return Err(Error::artifact("classifier has no transform id"));
        }
        self.forest.validate()?;
        Ok(self)
    }
}

/// A freshly trained, persisted classifier
#[derive(Debug, Clone)]
pub struct TrainedClassifier {
    pub model: Arc<ForestModel>,
    pub classifier_ref: ArtifactRef,
}

/// Fits classifiers on training splits and persists them
pub struct ClassifierTrainer {
    store: Arc<dyn ArtifactStore>,
}

impl ClassifierTrainer {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Train a forest on `train` with the given hyperparameters
    pub fn fit(&self, train: &Split, params: &TrainingConfig) -> Result<TrainedClassifier> {
        let start = Instant::now();

        let forest = RandomForest::fit(&train.rows, &train.labels, train.n_features, params)?;
        let model = ForestModel {
            transform_id: train.transform_id.clone(),
            params: params.clone(),
            trained_on: train.len(),
            forest,
        };

        let classifier_ref = model.persist(self.store.as_ref())?;

        info!(
            "Trained classifier {} on {} rows in {:?}",
            classifier_ref,
            train.len(),
            start.elapsed()
        );

        Ok(TrainedClassifier {
            model: Arc::new(model),
            classifier_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentimo_registry::MemoryArtifactStore;

    fn split() -> Split {
        let rows = vec![
            SparseVector::from_pairs(vec![(0, 1.0)]),
            SparseVector::from_pairs(vec![(1, 1.0)]),
            SparseVector::from_pairs(vec![(0, 0.8), (2, 0.6)]),
            SparseVector::from_pairs(vec![(1, 0.8), (2, 0.6)]),
        ];
        Split {
            transform_id: "t1".to_string(),
            n_features: 3,
            rows,
            labels: vec![Label::Positive, Label::Negative, Label::Positive, Label::Negative],
            source_indices: vec![0, 1, 2, 3],
        }
    }

    fn params() -> TrainingConfig {
        TrainingConfig {
            n_estimators: 8,
            random_state: 3,
            max_depth: None,
        }
    }

    #[test]
    fn test_fit_stamps_transform_and_persists() {
        let store = Arc::new(MemoryArtifactStore::new());
        let trainer = ClassifierTrainer::new(store.clone());

        let trained = trainer.fit(&split(), &params()).unwrap();
        assert_eq!(trained.model.transform_id, "t1");
        assert_eq!(trained.model.n_features(), 3);
        assert_eq!(trained.model.trained_on, 4);
        assert_eq!(trained.classifier_ref.kind, ArtifactKind::Classifier);

        let loaded = ForestModel::load(store.as_ref(), &trained.classifier_ref).unwrap();
        assert_eq!(&loaded, trained.model.as_ref());
    }

    #[test]
    fn test_fit_is_reproducible() {
        let store = Arc::new(MemoryArtifactStore::new());
        let trainer = ClassifierTrainer::new(store);

        let a = trainer.fit(&split(), &params()).unwrap();
        let b = trainer.fit(&split(), &params()).unwrap();
        assert_eq!(a.classifier_ref, b.classifier_ref);
    }

    #[test]
    fn test_single_class_training_fails() {
        let store = Arc::new(MemoryArtifactStore::new());
        let trainer = ClassifierTrainer::new(store);

        let mut train = split();
        train.labels = vec![Label::Negative; 4];
        let err = trainer.fit(&train, &params()).unwrap_err();
        assert!(matches!(err, Error::Training(_)));
    }

    #[test]
    fn test_load_rejects_wrong_kind() {
        let store = Arc::new(MemoryArtifactStore::new());
        let transform_ref = store.put(ArtifactKind::Transform, b"{}").unwrap();
        let err = ForestModel::load(store.as_ref(), &transform_ref).unwrap_err();
        assert!(matches!(err, Error::Artifact(_)));
    }
}

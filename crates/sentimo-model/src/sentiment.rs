//! Sentiment model: a fitted transform bound to the classifier trained on
//! its features

use crate::artifact::Artifact;
use crate::classifier::{ClassificationMetadata, ClassificationResult, Classifier};
use crate::features::TfidfTransform;
use crate::forest::label_for;
use crate::split::SparseVector;
use crate::trainer::ForestModel;
use sentimo_core::{ArtifactRef, ArtifactStore, Error, Label, Result};
use std::sync::Arc;
use std::time::Instant;

pub struct SentimentModel {
    name: String,
    transform: Arc<TfidfTransform>,
    transform_id: String,
    model: Arc<ForestModel>,
}

impl SentimentModel {
    /// Pair a transform with a classifier.
    ///
    /// `transform_id` is the transform's content digest; the classifier
    /// must have been trained against exactly that transform.
    pub fn new(
        transform: Arc<TfidfTransform>,
        transform_id: impl Into<String>,
        model: Arc<ForestModel>,
    ) -> Result<Self> {
        let transform_id = transform_id.into();

        if !model.is_compatible_with(&transform_id) {
            return Err(Error::artifact(format!(
                "classifier expects transform {} but was paired with {}",
                model.transform_id, transform_id
            )));
        }
        if model.n_features() != transform.n_features() {
            return Err(Error::artifact(format!(
                "classifier expects {} features, transform produces {}",
                model.n_features(),
                transform.n_features()
            )));
        }

        Ok(Self {
            name: "sentiment-forest".to_string(),
            transform,
            transform_id,
            model,
        })
    }

    /// Load both artifacts from `store` and pair them
    pub fn load(
        store: &dyn ArtifactStore,
        transform: &ArtifactRef,
        classifier: &ArtifactRef,
    ) -> Result<Self> {
        let fitted = TfidfTransform::load(store, transform)?;
        let model = ForestModel::load(store, classifier)?;
        Self::new(Arc::new(fitted), transform.digest.clone(), Arc::new(model))
    }

    /// Override the classifier name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Label and positive-class probability for `text`
    pub fn predict(&self, text: &str) -> (Label, f32) {
        self.predict_row(&self.transform.apply(text))
    }

    fn predict_row(&self, row: &SparseVector) -> (Label, f32) {
        let score = self.model.predict_proba(row);
        (label_for(score), score)
    }

    pub fn transform(&self) -> &TfidfTransform {
        &self.transform
    }

    pub fn transform_id(&self) -> &str {
        &self.transform_id
    }

    pub fn model(&self) -> &ForestModel {
        &self.model
    }
}

#[async_trait::async_trait]
impl Classifier for SentimentModel {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();

        let row = self.transform.apply(text);
        let (label, score) = self.predict_row(&row);

        Ok(ClassificationResult {
            label,
            score,
            metadata: ClassificationMetadata {
                transform_id: Some(self.transform_id.clone()),
                known_terms: row.nnz(),
                ..Default::default()
            },
            latency_us: start.elapsed().as_micros() as u64,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureEngineer;
    use crate::trainer::ClassifierTrainer;
    use sentimo_core::{CorpusRecord, TrainingConfig};
    use sentimo_registry::MemoryArtifactStore;

    fn corpus() -> Vec<CorpusRecord> {
        let mut records = Vec::new();
        for subject in ["movie", "film", "plot", "cast", "ending", "script"] {
            records.push(CorpusRecord::positive(format!("the {subject} was great")));
            records.push(CorpusRecord::negative(format!("the {subject} was terrible")));
        }
        records
    }

    fn trained(store: Arc<MemoryArtifactStore>) -> (ArtifactRef, ArtifactRef) {
        let features = FeatureEngineer::new(store.clone())
            .fit_transform(&corpus(), 50, 0.25, 42)
            .unwrap();
        let params = TrainingConfig {
            n_estimators: 15,
            random_state: 42,
            max_depth: None,
        };
        let trained = ClassifierTrainer::new(store)
            .fit(&features.train, &params)
            .unwrap();
        (features.transform_ref, trained.classifier_ref)
    }

    #[tokio::test]
    async fn test_load_and_classify() {
        let store = Arc::new(MemoryArtifactStore::new());
        let (transform_ref, classifier_ref) = trained(store.clone());

        let model = SentimentModel::load(store.as_ref(), &transform_ref, &classifier_ref).unwrap();
        assert_eq!(model.name(), "sentiment-forest");
        assert_eq!(model.transform_id(), transform_ref.digest);

        let result = model.classify("what a great movie").await.unwrap();
        assert_eq!(result.label, Label::Positive);
        assert!(result.metadata.known_terms >= 2);

        let (label, _) = model.predict("the film was terrible");
        assert_eq!(label, Label::Negative);
    }

    #[tokio::test]
    async fn test_unknown_words_still_classify() {
        let store = Arc::new(MemoryArtifactStore::new());
        let (transform_ref, classifier_ref) = trained(store.clone());
        let model = SentimentModel::load(store.as_ref(), &transform_ref, &classifier_ref).unwrap();

        let result = model.classify("zzz qqq").await.unwrap();
        assert_eq!(result.metadata.known_terms, 0);
        assert!((0.0..=1.0).contains(&result.score));
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let store = Arc::new(MemoryArtifactStore::new());
        let (_, classifier_ref) = trained(store.clone());

        let other = FeatureEngineer::new(store.clone())
            .fit_transform(&corpus()[..6], 50, 0.25, 1)
            .unwrap();

        let err = match SentimentModel::load(store.as_ref(), &other.transform_ref, &classifier_ref) {
            Err(e) => e,
            Ok(_) => panic!("mismatched pair was accepted"),
        };
        assert!(matches!(err, Error::Artifact(_)));
    }

    #[tokio::test]
    async fn test_classify_agrees_with_predict() {
        let store = Arc::new(MemoryArtifactStore::new());
        let (transform_ref, classifier_ref) = trained(store.clone());
        let model = SentimentModel::load(store.as_ref(), &transform_ref, &classifier_ref).unwrap();

        for text in ["the plot was great", "the cast was terrible", "great but terrible", ""] {
            let (label, score) = model.predict(text);
            let result = model.classify(text).await.unwrap();
            assert_eq!(result.label, label, "{text}");
            assert_eq!(result.score, score, "{text}");
        }
    }
}

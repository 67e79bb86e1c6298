//! Sentimo Model
//!
//! Everything needed to turn a labeled corpus into a servable sentiment
//! model:
//! - Corpus loading and cleaning (CSV)
//! - TF-IDF feature engineering with deterministic train/test splits
//! - Random forest training over sparse rows
//! - Held-out evaluation
//! - Pairing a transform with its classifier for inference
//!
//! Fitted transforms and classifiers are [`Artifact`]s: immutable values
//! persisted as opaque blobs through an `ArtifactStore`.

pub mod artifact;
pub mod classifier;
pub mod corpus;
pub mod evaluator;
pub mod features;
pub mod forest;
pub mod sentiment;
pub mod split;
pub mod trainer;

pub use artifact::Artifact;
pub use classifier::{ClassificationMetadata, ClassificationResult, Classifier};
pub use corpus::{CorpusColumns, CorpusLoader};
pub use evaluator::evaluate;
pub use features::{EngineeredFeatures, FeatureEngineer, TfidfTransform, Tokenizer};
pub use forest::RandomForest;
pub use sentiment::SentimentModel;
pub use split::{split_indices, SparseVector, Split};
pub use trainer::{ClassifierTrainer, ForestModel, TrainedClassifier};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::artifact::Artifact;
    pub use crate::classifier::{ClassificationResult, Classifier};
    pub use crate::evaluator::evaluate;
    pub use crate::features::{FeatureEngineer, TfidfTransform};
    pub use crate::sentiment::SentimentModel;
    pub use crate::trainer::{ClassifierTrainer, ForestModel};
}

//! Classifier trait and common types

use async_trait::async_trait;
use sentimo_core::{Label, Result};

/// Trait for anything that can label raw text
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// Result of classification
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Predicted label
    pub label: Label,

    /// Probability of the positive class (0.0-1.0)
    pub score: f32,

    /// Additional metadata
    pub metadata: ClassificationMetadata,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(label: Label, score: f32) -> Self {
        Self {
            label,
            score,
            metadata: ClassificationMetadata::default(),
            latency_us: 0,
        }
    }

    /// Confidence in the predicted label
    pub fn confidence(&self) -> f32 {
        match self.label {
            Label::Positive => self.score,
            Label::Negative => 1.0 - self.score,
        }
    }
}

/// Metadata about classification
#[derive(Debug, Clone, Default)]
pub struct ClassificationMetadata {
    /// Run whose model produced the prediction
    pub run_id: Option<String>,

    /// Transform digest used to vectorize the input
    pub transform_id: Option<String>,

    /// Number of input terms found in the vocabulary
    pub known_terms: usize,
}

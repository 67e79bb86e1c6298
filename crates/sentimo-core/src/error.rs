//! Error types for sentimo

/// Result type alias using sentimo's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for sentimo operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration, rejected before any work starts
    #[error("configuration error: {0}")]
    Config(String),

    /// Corpus has no usable rows after cleaning
    #[error("empty corpus: no usable rows after cleaning")]
    EmptyCorpus,

    /// Malformed corpus row (bad label, unreadable record)
    #[error("invalid corpus record: {0}")]
    InvalidRecord(String),

    /// Classifier training failed on its input data
    #[error("training error: {0}")]
    Training(String),

    /// Classifier and test split do not belong together
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Experiment has no recorded runs to select from
    #[error("no runs recorded for experiment '{0}'")]
    NoRuns(String),

    /// No usable promoted pair is loaded for serving
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Stored artifact is missing or fails its integrity check
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a new training error
    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    /// Create a new evaluation error
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Create a new model unavailable error
    pub fn model_unavailable(msg: impl Into<String>) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    /// Create a new artifact error
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller may retry the same operation later.
    ///
    /// Only serving-side unavailability is transient: the pipeline may
    /// publish a promoted pair at any time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelUnavailable(_))
    }
}

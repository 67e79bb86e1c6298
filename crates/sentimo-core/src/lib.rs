//! Sentimo Core
//!
//! Core types, traits, and utilities shared across sentimo components.
//!
//! This crate provides:
//! - Corpus, label and metrics types
//! - Error types and result handling
//! - Pipeline configuration loaded from YAML
//! - Artifact identity (content digests) and the artifact store trait

pub mod artifact;
pub mod config;
pub mod error;
pub mod types;

pub use artifact::{digest_hex, ArtifactKind, ArtifactRef, ArtifactStore};
pub use config::{
    FeatureConfig, PipelineConfig, RegistryConfig, ReportConfig, SplitConfig, TrainingConfig,
};
pub use error::{Error, Result};
pub use types::{CorpusRecord, Label, MetricsRecord};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifact::{ArtifactKind, ArtifactRef, ArtifactStore};
    pub use crate::error::{Error, Result};
    pub use crate::types::{CorpusRecord, Label, MetricsRecord};
}

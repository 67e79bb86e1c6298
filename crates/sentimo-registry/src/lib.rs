//! Sentimo Registry
//!
//! Durable bookkeeping for the model lifecycle.
//!
//! Provides:
//! - Content-addressed artifact stores (filesystem and in-memory)
//! - Append-only run records with best-run selection
//! - Atomic promotion of a run's (transform, classifier) pair
//! - A hash-chained promotion history

pub mod atomic;
pub mod history;
pub mod pointer;
pub mod registry;
pub mod runs;
pub mod store;

pub use history::{PromotionLog, PromotionRecord};
pub use pointer::PromotedPair;
pub use registry::{LoadedPair, PromotionOutcome, RunRegistry};
pub use runs::{compare_runs, select_best_of, FsRunStore, Run, RunStore};
pub use store::{FsArtifactStore, MemoryArtifactStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::registry::{PromotionOutcome, RunRegistry};
    pub use crate::runs::{Run, RunStore};
    pub use crate::store::{FsArtifactStore, MemoryArtifactStore};
}

//! sentimo serving and orchestration
//!
//! The batch [`TrainingPipeline`], the [`PredictionService`] that serves the
//! promoted pair, and the axum router in front of it.

pub mod config;
pub mod pipeline;
pub mod routes;
pub mod service;

pub use config::{AppConfig, ServerConfig};
pub use pipeline::{PipelineOutcome, Stage, StageError, TrainingPipeline};
pub use routes::{create_router, AppError, AppState, PredictRequest, PredictResponse};
pub use service::{Prediction, PredictionService, ServiceState, ServiceStatus};

//! Prediction service
//!
//! Holds at most one loaded (transform, classifier) pair behind an `Arc`.
//! Predictions clone the `Arc` under a short read lock and run without any
//! lock held; `reload` builds the replacement pair first and only then swaps
//! it in, so in-flight predictions finish on the pair they started with.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sentimo_core::{Error, Label, Result};
use sentimo_model::{
    Artifact, ClassificationResult, Classifier, ForestModel, SentimentModel, TfidfTransform,
};
use sentimo_registry::{PromotedPair, RunRegistry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle state of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// No usable pair; every prediction fails with `ModelUnavailable`
    Unloaded,
    /// Serving a promoted pair
    Ready,
}

/// A single prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Label,
    /// Probability of the positive class
    pub score: f32,
    /// Run whose artifacts produced the prediction
    pub run_id: String,
}

/// Snapshot of what the service is serving
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub run_id: Option<String>,
    pub experiment: Option<String>,
    pub transform: Option<String>,
    pub classifier: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

struct LoadedModel {
    pair: PromotedPair,
    model: SentimentModel,
    loaded_at: DateTime<Utc>,
}

pub struct PredictionService {
    registry: Arc<RunRegistry>,
    current: RwLock<Option<Arc<LoadedModel>>>,
    reload_lock: Mutex<()>,
}

impl PredictionService {
    /// Create an unloaded service
    pub fn new(registry: Arc<RunRegistry>) -> Self {
        Self {
            registry,
            current: RwLock::new(None),
            reload_lock: Mutex::new(()),
        }
    }

    /// Create a service and try to load the promoted pair. A failed load
    /// leaves the service unloaded rather than failing startup.
    pub fn start(registry: Arc<RunRegistry>) -> Self {
        let service = Self::new(registry);
        if let Err(e) = service.reload() {
            warn!("Starting without a model: {}", e);
        }
        service
    }

    pub fn state(&self) -> ServiceState {
        if self.current.read().is_some() {
            ServiceState::Ready
        } else {
            ServiceState::Unloaded
        }
    }

    pub fn status(&self) -> ServiceStatus {
        match self.snapshot() {
            Some(loaded) => ServiceStatus {
                state: ServiceState::Ready,
                run_id: Some(loaded.pair.run_id.clone()),
                experiment: Some(loaded.pair.experiment.clone()),
                transform: Some(loaded.pair.transform.digest.clone()),
                classifier: Some(loaded.pair.classifier.digest.clone()),
                loaded_at: Some(loaded.loaded_at),
            },
            None => ServiceStatus {
                state: ServiceState::Unloaded,
                run_id: None,
                experiment: None,
                transform: None,
                classifier: None,
                loaded_at: None,
            },
        }
    }

    fn snapshot(&self) -> Option<Arc<LoadedModel>> {
        self.current.read().clone()
    }

    fn loaded(&self) -> Result<Arc<LoadedModel>> {
        self.snapshot()
            .ok_or_else(|| Error::model_unavailable("no promoted model is loaded"))
    }

    /// Label `text` with the loaded pair
    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let start = Instant::now();
        let loaded = match self.loaded() {
            Ok(loaded) => loaded,
            Err(e) => {
                metrics::counter!("sentimo_prediction_errors_total", "reason" => "unavailable")
                    .increment(1);
                return Err(e);
            }
        };

        let (label, score) = loaded.model.predict(text);

        metrics::counter!("sentimo_predictions_total", "sentiment" => label.as_str()).increment(1);
        metrics::histogram!("sentimo_predict_latency_us")
            .record(start.elapsed().as_micros() as f64);

        Ok(Prediction {
            label,
            score,
            run_id: loaded.pair.run_id.clone(),
        })
    }

    /// Load the currently promoted pair and swap it in.
    ///
    /// On failure the previously loaded pair (if any) keeps serving and the
    /// error is returned.
    pub fn reload(&self) -> Result<ServiceStatus> {
        let _guard = self.reload_lock.lock();

        match self.build() {
            Ok(loaded) => {
                let previous = self
                    .current
                    .write()
                    .replace(Arc::new(loaded))
                    .map(|p| p.pair.run_id.clone());

                metrics::counter!("sentimo_reloads_total", "outcome" => "success").increment(1);
                let status = self.status();
                info!(
                    "Loaded run {} (previous: {})",
                    status.run_id.as_deref().unwrap_or("-"),
                    previous.as_deref().unwrap_or("none")
                );
                Ok(status)
            }
            Err(e) => {
                metrics::counter!("sentimo_reloads_total", "outcome" => "failure").increment(1);
                if self.state() == ServiceState::Ready {
                    warn!("Reload failed, keeping the current model: {}", e);
                } else {
                    warn!("Reload failed, service remains unloaded: {}", e);
                }
                Err(e)
            }
        }
    }

    fn build(&self) -> Result<LoadedModel> {
        let loaded = self.registry.load_current()?;
        let unavailable = |e: Error| Error::model_unavailable(e.to_string());

        let transform = TfidfTransform::from_bytes(&loaded.transform).map_err(unavailable)?;
        let classifier = ForestModel::from_bytes(&loaded.classifier).map_err(unavailable)?;
        let model = SentimentModel::new(
            Arc::new(transform),
            loaded.pair.transform.digest.clone(),
            Arc::new(classifier),
        )
        .map_err(unavailable)?;

        debug!(
            "Built model for run {} ({} features)",
            loaded.pair.run_id,
            model.transform().n_features()
        );

        Ok(LoadedModel {
            pair: loaded.pair,
            model,
            loaded_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Classifier for PredictionService {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();
        let loaded = match self.loaded() {
            Ok(loaded) => loaded,
            Err(e) => {
                metrics::counter!("sentimo_prediction_errors_total", "reason" => "unavailable")
                    .increment(1);
                return Err(e);
            }
        };

        let mut result = loaded.model.classify(text).await?;
        result.metadata.run_id = Some(loaded.pair.run_id.clone());

        metrics::counter!("sentimo_predictions_total", "sentiment" => result.label.as_str())
            .increment(1);
        metrics::histogram!("sentimo_predict_latency_us")
            .record(start.elapsed().as_micros() as f64);

        Ok(result)
    }

    fn name(&self) -> &str {
        "prediction-service"
    }
}

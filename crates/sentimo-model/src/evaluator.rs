//! Held-out evaluation

use crate::split::Split;
use crate::trainer::ForestModel;
use sentimo_core::{Error, Label, MetricsRecord, Result};
use tracing::info;

/// Score `model` on `test`.
///
/// The split must come from the same transform the model was trained
/// against; anything else is an `Error::Evaluation`.
pub fn evaluate(model: &ForestModel, test: &Split) -> Result<MetricsRecord> {
    if !model.is_compatible_with(&test.transform_id) {
        return Err(Error::evaluation(format!(
            "classifier was trained on transform {} but the test split comes from {}",
            model.transform_id, test.transform_id
        )));
    }
    if model.n_features() != test.n_features {
        return Err(Error::evaluation(format!(
            "classifier expects {} features, test split has {}",
            model.n_features(),
            test.n_features
        )));
    }
    if test.rows.len() != test.labels.len() {
        return Err(Error::evaluation(format!(
            "test split has {} rows but {} labels",
            test.rows.len(),
            test.labels.len()
        )));
    }
    if test.is_empty() {
        return Err(Error::evaluation("test split is empty"));
    }

    let (mut tp, mut tn, mut fp, mut fn_) = (0, 0, 0, 0);
    for (row, &actual) in test.rows.iter().zip(&test.labels) {
        if row.min_dimension() > model.n_features() {
            return Err(Error::evaluation(format!(
                "row of dimension {} exceeds {} features",
                row.min_dimension(),
                model.n_features()
            )));
        }
        match (model.predict(row), actual) {
            (Label::Positive, Label::Positive) => tp += 1,
            (Label::Negative, Label::Negative) => tn += 1,
            (Label::Positive, Label::Negative) => fp += 1,
            (Label::Negative, Label::Positive) => fn_ += 1,
        }
    }

    let metrics = MetricsRecord::from_confusion(tp, tn, fp, fn_);
    info!(
        "Evaluated on {} rows: accuracy {:.4}, f1 {:.4}",
        metrics.support, metrics.accuracy, metrics.f1
    );

    Ok(metrics)
}

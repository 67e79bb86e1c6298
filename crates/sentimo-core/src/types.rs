//! Core types for sentimo

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Negative = 0,
    Positive = 1,
}

impl Label {
    /// Numeric class index (0 = negative, 1 = positive)
    pub fn as_index(self) -> usize {
        self as usize
    }

    /// Build a label from a class index
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Negative),
            1 => Some(Self::Positive),
            _ => None,
        }
    }

    /// Human-readable label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Positive => "positive",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    /// Accepts both the raw dataset spelling and the cleaned 1/0 mapping
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" | "1" => Ok(Self::Positive),
            "negative" | "neg" | "0" => Ok(Self::Negative),
            other => Err(format!("unknown sentiment label '{other}'")),
        }
    }
}

/// A single labeled document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRecord {
    /// Cleaned document text
    pub text: String,

    /// Sentiment label
    pub label: Label,
}

impl CorpusRecord {
    /// Create a new corpus record
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }

    /// Create a positive record
    pub fn positive(text: impl Into<String>) -> Self {
        Self::new(text, Label::Positive)
    }

    /// Create a negative record
    pub fn negative(text: impl Into<String>) -> Self {
        Self::new(text, Label::Negative)
    }
}

/// Evaluation metrics for one classifier against its paired test split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Fraction of correct predictions, in [0, 1]
    pub accuracy: f64,

    /// Precision of the positive class
    pub precision: f64,

    /// Recall of the positive class
    pub recall: f64,

    /// Harmonic mean of precision and recall
    pub f1: f64,

    /// Number of evaluated samples
    pub support: usize,

    /// Confusion matrix counts
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl MetricsRecord {
    /// Build a metrics record from confusion counts
    pub fn from_confusion(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        let support = tp + tn + fp + fn_;
        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            accuracy: ratio(tp + tn, support),
            precision,
            recall,
            f1,
            support,
            true_positives: tp,
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    /// Metrics built from accuracy alone (externally reported runs)
    pub fn with_accuracy(accuracy: f64) -> Self {
        Self {
            accuracy,
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            support: 0,
            true_positives: 0,
            true_negatives: 0,
            false_positives: 0,
            false_negatives: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing() {
        assert_eq!("positive".parse::<Label>().unwrap(), Label::Positive);
        assert_eq!(" Negative ".parse::<Label>().unwrap(), Label::Negative);
        assert_eq!("1".parse::<Label>().unwrap(), Label::Positive);
        assert_eq!("0".parse::<Label>().unwrap(), Label::Negative);
        assert!("neutral".parse::<Label>().is_err());
    }

    #[test]
    fn test_label_index_roundtrip() {
        assert_eq!(Label::Positive.as_index(), 1);
        assert_eq!(Label::from_index(0), Some(Label::Negative));
        assert_eq!(Label::from_index(2), None);
    }

    #[test]
    fn test_label_serializes_lowercase() {
        let json = serde_json::to_string(&Label::Positive).unwrap();
        assert_eq!(json, "\"positive\"");
    }

    #[test]
    fn test_metrics_from_confusion() {
        let metrics = MetricsRecord::from_confusion(4, 3, 1, 2);
        assert_eq!(metrics.support, 10);
        assert!((metrics.accuracy - 0.7).abs() < 1e-12);
        assert!((metrics.precision - 0.8).abs() < 1e-12);
        assert!((metrics.recall - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_no_positive_predictions() {
        let metrics = MetricsRecord::from_confusion(0, 5, 0, 5);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.f1, 0.0);
        assert!((metrics.accuracy - 0.5).abs() < 1e-12);
    }
}

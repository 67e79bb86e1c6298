//! Sparse feature rows and deterministic train/test splitting

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sentimo_core::Label;
use serde::{Deserialize, Serialize};

/// Sparse feature vector with strictly increasing indices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    /// Build from `(index, value)` pairs. Pairs are sorted; zero values dropped.
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.sort_by_key(|&(idx, _)| idx);
        pairs.dedup_by_key(|&mut (idx, _)| idx);

        let (indices, values) = pairs.into_iter().filter(|&(_, v)| v != 0.0).unzip();
        Self { indices, values }
    }

    /// Value at `index` (zero when absent)
    pub fn get(&self, index: usize) -> f32 {
        let Ok(index) = u32::try_from(index) else {
            return 0.0;
        };
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Number of stored (non-zero) entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Largest stored index + 1
    pub fn min_dimension(&self) -> usize {
        self.indices.last().map_or(0, |&i| i as usize + 1)
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Iterate `(index, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices
            .iter()
            .zip(self.values.iter())
            .map(|(&i, &v)| (i as usize, v))
    }
}

/// One side of a train/test partition
///
/// Every split remembers which transform produced its rows so a classifier
/// can never be scored against features from another vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Digest of the transform that produced these rows
    pub transform_id: String,

    /// Dimension of the feature space
    pub n_features: usize,

    /// Feature rows
    pub rows: Vec<SparseVector>,

    /// Labels aligned with `rows`
    pub labels: Vec<Label>,

    /// Corpus positions of the rows (for reproducibility checks)
    pub source_indices: Vec<usize>,
}

impl Split {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows per label `(negative, positive)`
    pub fn class_counts(&self) -> (usize, usize) {
        let positive = self
            .labels
            .iter()
            .filter(|&&l| l == Label::Positive)
            .count();
        (self.labels.len() - positive, positive)
    }
}

/// Shuffle `0..n` with `seed` and cut it into `(train, test)` index sets.
///
/// The test side receives `ceil(n * test_ratio)` rows. Identical inputs
/// always yield identical output.
pub fn split_indices(n: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64) * test_ratio).ceil() as usize;
    let n_test = n_test.min(n);

    let train = indices.split_off(n_test);
    let test = indices;

    tracing::debug!(
        "Dataset split: {} training, {} test (seed {})",
        train.len(),
        test.len(),
        seed
    );

    (train, test)
}

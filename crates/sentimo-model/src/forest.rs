//! Random forest over sparse rows
//!
//! Each tree is a CART classifier grown on a bootstrap sample with Gini
//! impurity. At every node a random subset of `ceil(sqrt(n_features))`
//! features is searched; if none of them separates the node, the search
//! carries on through the remaining features before giving up. Trees are
//! stored as flat node arrays so deep trees serialize without recursion.

use crate::split::SparseVector;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sentimo_core::{Error, Label, Result, TrainingConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Node of a flattened decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlatNode {
    /// Terminal node holding the positive-class fraction of its samples
    Leaf { positive: f32, samples: u32 },

    /// `row[feature] <= threshold` goes left, everything else right
    Split {
        feature: u32,
        threshold: f32,
        left: u32,
        right: u32,
    },
}

/// A single fitted decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<FlatNode>,
}

/// Gini impurity of a binary node: `1 - p^2 - (1-p)^2`
fn gini(positive: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positive as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

/// Threshold strictly between `lo` and `hi` that keeps `lo` on the left
fn midpoint(lo: f32, hi: f32) -> f32 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi {
        lo
    } else {
        mid
    }
}

/// Best threshold over a column sorted by value, as `(threshold, gain)`
fn scan_column(column: &[(f32, bool)], parent: f64, n_positive: usize) -> Option<(f32, f64)> {
    let n = column.len();
    let mut best: Option<(f32, f64)> = None;
    let mut left_n = 0;
    let mut left_pos = 0;

    for i in 0..n - 1 {
        left_n += 1;
        if column[i].1 {
            left_pos += 1;
        }
        if column[i].0 == column[i + 1].0 {
            continue;
        }

        let right_n = n - left_n;
        let right_pos = n_positive - left_pos;
        let weighted = (left_n as f64 * gini(left_pos, left_n)
            + right_n as f64 * gini(right_pos, right_n))
            / n as f64;
        let gain = parent - weighted;

        if gain > best.map_or(0.0, |(_, g)| g) {
            best = Some((midpoint(column[i].0, column[i + 1].0), gain));
        }
    }

    best
}

struct TreeBuilder<'a> {
    rows: &'a [SparseVector],
    labels: &'a [Label],
    n_features: usize,
    max_features: usize,
    max_depth: Option<usize>,
}

impl TreeBuilder<'_> {
    fn count_positive(&self, samples: &[usize]) -> usize {
        samples
            .iter()
            .filter(|&&i| self.labels[i] == Label::Positive)
            .count()
    }

    fn best_split(&self, samples: &[usize], n_positive: usize, rng: &mut StdRng) -> Option<(u32, f32)> {
        let n = samples.len();
        let parent = gini(n_positive, n);

        let mut features: Vec<u32> = (0..self.n_features as u32).collect();
        features.shuffle(rng);

        let mut visited = 0;
        let mut best: Option<(u32, f32, f64)> = None;
        let mut column: Vec<(f32, bool)> = Vec::with_capacity(n);

        for feature in features {
            if visited >= self.max_features && best.is_some() {
                break;
            }

            column.clear();
            column.extend(samples.iter().map(|&i| {
                (
                    self.rows[i].get(feature as usize),
                    self.labels[i] == Label::Positive,
                )
            }));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Constant features do not count towards the search budget
            if column[0].0 == column[n - 1].0 {
                continue;
            }
            visited += 1;

            if let Some((threshold, gain)) = scan_column(&column, parent, n_positive) {
                if best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, threshold, gain));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn build(&self, samples: Vec<usize>, rng: &mut StdRng) -> DecisionTree {
        let placeholder = FlatNode::Leaf {
            positive: 0.0,
            samples: 0,
        };
        let mut nodes = vec![placeholder.clone()];
        let mut pending = vec![(0usize, samples, 0usize)];

        while let Some((slot, samples, depth)) = pending.pop() {
            let n = samples.len();
            let n_positive = self.count_positive(&samples);

            let leaf = FlatNode::Leaf {
                positive: if n == 0 {
                    0.0
                } else {
                    n_positive as f32 / n as f32
                },
                samples: n as u32,
            };

            let pure = n_positive == 0 || n_positive == n;
            let depth_reached = self.max_depth.is_some_and(|d| depth >= d);
            if n < 2 || pure || depth_reached {
                nodes[slot] = leaf;
                continue;
            }

            let Some((feature, threshold)) = self.best_split(&samples, n_positive, rng) else {
                nodes[slot] = leaf;
                continue;
            };

            let (left, right): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&i| self.rows[i].get(feature as usize) <= threshold);

            let left_slot = nodes.len();
            nodes.push(placeholder.clone());
            let right_slot = nodes.len();
            nodes.push(placeholder.clone());

            nodes[slot] = FlatNode::Split {
                feature,
                threshold,
                left: left_slot as u32,
                right: right_slot as u32,
            };

            pending.push((right_slot, right, depth + 1));
            pending.push((left_slot, left, depth + 1));
        }

        DecisionTree { nodes }
    }
}

impl DecisionTree {
    /// Positive-class probability for one row
    pub fn predict_proba(&self, row: &SparseVector) -> f32 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                FlatNode::Leaf { positive, .. } => return *positive,
                FlatNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row.get(*feature as usize) <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match &self.nodes[idx] {
                FlatNode::Leaf { .. } => max_depth = max_depth.max(depth),
                FlatNode::Split { left, right, .. } => {
                    stack.push((*left as usize, depth + 1));
                    stack.push((*right as usize, depth + 1));
                }
            }
        }
        max_depth
    }

    /// Check the node array is a well-formed tree over `n_features` inputs
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let FlatNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature as usize >= n_features {
                    return Err(format!(
                        "node {idx} splits on feature {feature} outside {n_features} features"
                    ));
                }
                // Children always follow their parent, which rules out cycles
                for child in [*left as usize, *right as usize] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {idx} has invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged ensemble of decision trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit `params.n_estimators` trees. Tree `i` draws its bootstrap sample
    /// and feature subsets from a generator seeded with `random_state + i`.
    pub fn fit(
        rows: &[SparseVector],
        labels: &[Label],
        n_features: usize,
        params: &TrainingConfig,
    ) -> Result<Self> {
        params
            .validate()
            .map_err(|e| Error::training(format!("invalid hyperparameters: {e}")))?;

        if rows.len() != labels.len() {
            return Err(Error::training(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if rows.is_empty() {
            return Err(Error::training("training split is empty"));
        }
        if n_features == 0 {
            return Err(Error::training("feature space is empty"));
        }
        if let Some(row) = rows.iter().find(|r| r.min_dimension() > n_features) {
            return Err(Error::training(format!(
                "row of dimension {} exceeds {} features",
                row.min_dimension(),
                n_features
            )));
        }

        let n_positive = labels.iter().filter(|&&l| l == Label::Positive).count();
        if n_positive == 0 || n_positive == labels.len() {
            let present = if n_positive == 0 {
                Label::Negative
            } else {
                Label::Positive
            };
            return Err(Error::training(format!(
                "labels are not binary: only '{present}' present"
            )));
        }

        let builder = TreeBuilder {
            rows,
            labels,
            n_features,
            max_features: ((n_features as f64).sqrt().ceil() as usize).max(1),
            max_depth: params.max_depth,
        };

        let n = rows.len();
        let dist = Uniform::from(0..n);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for i in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(params.random_state.wrapping_add(i as u64));
            let bootstrap: Vec<usize> = (0..n).map(|_| dist.sample(&mut rng)).collect();

            let tree = builder.build(bootstrap, &mut rng);
            debug!(
                "Tree {}: {} nodes, depth {}",
                i,
                tree.n_nodes(),
                tree.depth()
            );
            trees.push(tree);
        }

        info!(
            "Fitted random forest: {} trees over {} rows, {} features",
            trees.len(),
            n,
            n_features
        );

        Ok(Self { n_features, trees })
    }

    /// Mean positive-class probability across trees
    pub fn predict_proba(&self, row: &SparseVector) -> f32 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f32 = self.trees.iter().map(|t| t.predict_proba(row)).sum();
        total / self.trees.len() as f32
    }

    /// Positive iff the mean probability exceeds one half
    pub fn predict(&self, row: &SparseVector) -> Label {
        label_for(self.predict_proba(row))
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural check applied to decoded forests
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::artifact("forest has no trees"));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| Error::artifact(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }
}

/// Decision rule shared by every prediction path: positive iff > 0.5
pub fn label_for(score: f32) -> Label {
    if score > 0.5 {
        Label::Positive
    } else {
        Label::Negative
    }
}

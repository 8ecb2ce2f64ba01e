//! Isolation-forest outlier model
//!
//! Complements z-score detection on non-Gaussian metrics. Each tree
//! recursively picks a random split point between the subsample's min
//! and max; outliers isolate in few splits, so their average path
//! length is short and their anomaly score high. Fitted trees are
//! serialized with the model, so a reloaded model predicts exactly
//! like the freshly trained one.

use crate::error::{MonitorError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const DEFAULT_TREE_COUNT: usize = 100;
const DEFAULT_MAX_SUBSAMPLE: usize = 256;
const DEFAULT_SCORE_THRESHOLD: f64 = 0.6;

/// Euler-Mascheroni constant, used in the average path-length estimate
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Training configuration for the isolation forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// Number of trees in the forest
    pub tree_count: usize,
    /// Maximum subsample size per tree
    pub max_subsample: usize,
    /// Anomaly-score cutoff; scores above it flag an outlier
    pub score_threshold: f64,
    /// Seed for reproducible training; random when absent
    pub seed: Option<u64>,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            tree_count: DEFAULT_TREE_COUNT,
            max_subsample: DEFAULT_MAX_SUBSAMPLE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            seed: None,
        }
    }
}

/// One node of an isolation tree over scalar values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        split: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Per-metric isolation forest fitted over historical scalar values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationModel {
    pub metric_name: String,
    trees: Vec<Node>,
    subsample: usize,
    score_threshold: f64,
}

impl IsolationModel {
    /// Fit a forest over a batch of historical values
    pub fn fit(
        metric_name: impl Into<String>,
        values: &[f64],
        config: &IsolationConfig,
    ) -> Result<Self> {
        let metric_name = metric_name.into();
        if values.is_empty() {
            return Err(MonitorError::InsufficientData {
                metric: metric_name,
            });
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let subsample = config.max_subsample.min(values.len()).max(1);
        let max_depth = (subsample as f64).log2().ceil() as usize;

        let trees = (0..config.tree_count.max(1))
            .map(|_| {
                let sample: Vec<f64> = values
                    .choose_multiple(&mut rng, subsample)
                    .copied()
                    .collect();
                build_tree(&mut rng, &sample, 0, max_depth)
            })
            .collect();

        Ok(Self {
            metric_name,
            trees,
            subsample,
            score_threshold: config.score_threshold,
        })
    }

    /// Anomaly score in (0, 1); higher means more isolated
    pub fn score(&self, value: f64) -> f64 {
        let avg_path: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, value, 0.0))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normalizer = average_path_length(self.subsample);
        if normalizer < f64::EPSILON {
            return 0.5;
        }
        2.0_f64.powf(-avg_path / normalizer)
    }

    /// True when the value falls outside the learned density region
    pub fn predict(&self, value: f64) -> bool {
        self.score(value) > self.score_threshold
    }
}

fn build_tree(rng: &mut StdRng, values: &[f64], depth: usize, max_depth: usize) -> Node {
    if values.len() <= 1 || depth >= max_depth {
        return Node::Leaf {
            size: values.len(),
        };
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max - min) < f64::EPSILON {
        return Node::Leaf {
            size: values.len(),
        };
    }

    let split = rng.gen_range(min..max);
    let (left, right): (Vec<f64>, Vec<f64>) = values.iter().copied().partition(|&v| v < split);

    Node::Split {
        split,
        left: Box::new(build_tree(rng, &left, depth + 1, max_depth)),
        right: Box::new(build_tree(rng, &right, depth + 1, max_depth)),
    }
}

fn path_length(node: &Node, value: f64, depth: f64) -> f64 {
    match node {
        Node::Leaf { size } => depth + average_path_length(*size),
        Node::Split { split, left, right } => {
            if value < *split {
                path_length(left, value, depth + 1.0)
            } else {
                path_length(right, value, depth + 1.0)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` values
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config() -> IsolationConfig {
        IsolationConfig {
            seed: Some(42),
            ..Default::default()
        }
    }

    /// Stable history around 50 with mild continuous noise
    fn noisy_history() -> Vec<f64> {
        (0..200)
            .map(|i| 50.0 + (i as f64 * 0.7).sin() * 2.0)
            .collect()
    }

    #[test]
    fn test_fit_empty_history_is_error() {
        let err = IsolationModel::fit("cpu", &[], &seeded_config()).unwrap_err();
        assert!(matches!(err, MonitorError::InsufficientData { .. }));
    }

    #[test]
    fn test_outlier_scores_higher_than_inlier() {
        let model = IsolationModel::fit("cpu", &noisy_history(), &seeded_config()).unwrap();

        let inlier = model.score(50.0);
        let outlier = model.score(500.0);
        assert!(
            outlier > inlier,
            "outlier {outlier} should exceed inlier {inlier}"
        );
    }

    #[test]
    fn test_predict_flags_far_outlier() {
        let model = IsolationModel::fit("cpu", &noisy_history(), &seeded_config()).unwrap();

        assert!(model.predict(500.0));
        assert!(!model.predict(50.0));
    }

    #[test]
    fn test_constant_history_is_never_flagged() {
        // Degenerate forest: single-leaf trees, score pinned at 0.5
        let values = vec![42.0; 64];
        let model = IsolationModel::fit("flat", &values, &seeded_config()).unwrap();

        assert!(!model.predict(42.0));
        assert!(!model.predict(1000.0));
    }

    #[test]
    fn test_serialized_model_predicts_identically() {
        let model = IsolationModel::fit("cpu", &noisy_history(), &seeded_config()).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let restored: IsolationModel = serde_json::from_str(&json).unwrap();

        for value in [0.0, 48.5, 50.0, 51.5, 200.0, 500.0] {
            assert_eq!(model.score(value), restored.score(value));
            assert_eq!(model.predict(value), restored.predict(value));
        }
    }

    #[test]
    fn test_average_path_length_grows_with_n() {
        assert_eq!(average_path_length(1), 0.0);
        assert!(average_path_length(16) > average_path_length(4));
        // c(2) = 2*(ln 1 + gamma) - 1
        let expected = 2.0 * EULER_GAMMA - 1.0;
        assert!((average_path_length(2) - expected).abs() < 1e-12);
    }
}

//! Isolation-forest evaluation over exported tree arrays.
//!
//! Trees are stored in the flat array layout used by common tree learners:
//! node `i` is a leaf when `children_left[i] == -1`, otherwise samples with
//! `x[feature[i]] <= threshold[i]` go left.

use crate::features::FEATURE_COUNT;
use serde::Deserialize;

use super::ClassifierLoadError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const LEAF: i64 = -1;

/// Average path length of an unsuccessful search in a binary search tree
/// built from `n` samples.
pub fn average_path_length(n: f64) -> f64 {
    if n <= 1.0 {
        0.0
    } else if n <= 2.0 {
        1.0
    } else {
        2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
    }
}

/// One exported isolation tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IsolationTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub n_node_samples: Vec<f64>,
    /// Maps a tree-local feature index to the input vector index, for trees
    /// trained on a feature subset. Identity when absent.
    #[serde(default)]
    pub features: Option<Vec<usize>>,
}

impl IsolationTree {
    fn validate(&self, tree: usize) -> Result<(), ClassifierLoadError> {
        let n = self.children_left.len();
        let invalid = |reason: String| ClassifierLoadError::Tree { tree, reason };

        if n == 0 {
            return Err(invalid("tree has no nodes".to_string()));
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.n_node_samples.len() != n
        {
            return Err(invalid("node arrays differ in length".to_string()));
        }
        if let Some(map) = &self.features {
            if let Some(bad) = map.iter().find(|&&i| i >= FEATURE_COUNT) {
                return Err(invalid(format!("feature mapping {} out of range", bad)));
            }
        }
        let width = self.features.as_ref().map_or(FEATURE_COUNT, Vec::len);

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF {
                continue;
            }
            // Children always come after their parent, which also rules out cycles.
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(invalid(format!(
                        "node {} has invalid child index {}",
                        node, child
                    )));
                }
            }
            let f = self.feature[node];
            if f < 0 || f as usize >= width {
                return Err(invalid(format!("node {} splits on unknown feature {}", node, f)));
            }
        }
        Ok(())
    }

    /// Depth of the leaf reached by `x`, adjusted for the samples left in it.
    pub fn path_length(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = 0usize;
        let mut depth = 0.0;
        while self.children_left[node] != LEAF {
            let local = self.feature[node] as usize;
            let input = match &self.features {
                Some(map) => map[local],
                None => local,
            };
            node = if x[input] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
            depth += 1.0;
        }
        depth + average_path_length(self.n_node_samples[node])
    }
}

/// An ensemble of isolation trees with its decision offset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IsolationForest {
    pub trees: Vec<IsolationTree>,
    /// Number of samples each tree was grown from.
    pub max_samples: f64,
    /// Subtracted from the raw score; negative decisions are outliers.
    pub offset: f64,
}

impl IsolationForest {
    pub(crate) fn validate(&self) -> Result<(), ClassifierLoadError> {
        if self.trees.is_empty() {
            return Err(ClassifierLoadError::Invalid("forest has no trees".to_string()));
        }
        if !(self.max_samples >= 1.0) || !self.offset.is_finite() {
            return Err(ClassifierLoadError::Invalid(format!(
                "invalid forest parameters: max_samples={}, offset={}",
                self.max_samples, self.offset
            )));
        }
        self.trees
            .iter()
            .enumerate()
            .try_for_each(|(i, tree)| tree.validate(i))
    }

    /// Anomaly score in `[-1, 0)`; lower is more abnormal.
    pub fn score(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mean_depth =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let normalizer = average_path_length(self.max_samples).max(f64::MIN_POSITIVE);
        -(2f64.powf(-mean_depth / normalizer))
    }

    pub fn decision_function(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        self.score(x) - self.offset
    }
}

//! Regression tree grown by greedy variance reduction.
//!
//! Leaves predict the mean label of their training rows, so for `0/1` labels
//! the output is a class-1 frequency.

use super::{check_fit_input, check_predict_input, Estimator, Predictor};
use crate::error::ModelError;
use crate::serialization::PersistentModel;
use crate::tuning::ParamSet;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Maximum depth; `0` grows a single leaf.
    pub max_depth: usize,
    /// A node with fewer rows is never split.
    pub min_samples_split: usize,
    /// Each child of a split keeps at least this many rows.
    pub min_samples_leaf: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl DecisionTree {
    pub const PARAMS: &'static [&'static str] =
        &["max_depth", "min_samples_split", "min_samples_leaf"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        params.check_known("tree", Self::PARAMS)?;
        let defaults = Self::default();
        let tree = Self {
            max_depth: params.get_usize_or("max_depth", defaults.max_depth)?,
            min_samples_split: params
                .get_usize_or("min_samples_split", defaults.min_samples_split)?,
            min_samples_leaf: params.get_usize_or("min_samples_leaf", defaults.min_samples_leaf)?,
        };
        tree.validate()?;
        Ok(tree)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.min_samples_split < 2 {
            return Err(ModelError::invalid_parameter("min_samples_split", "must be >= 2"));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::invalid_parameter("min_samples_leaf", "must be >= 1"));
        }
        Ok(())
    }
}

/// A node in the flattened tree. Children are indices into the node vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Grower<'a> {
    settings: &'a DecisionTree,
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    nodes: Vec<Node>,
}

impl Grower<'_> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let mean = rows.iter().map(|&i| self.y[i]).sum::<f64>() / rows.len() as f64;
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= self.settings.max_depth || rows.len() < self.settings.min_samples_split {
            return id;
        }
        let Some(best) = self.best_split(&rows) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.x[[i, best.feature]] <= best.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    /// Best split by reduction in summed squared error over all features.
    fn best_split(&self, rows: &[usize]) -> Option<SplitCandidate> {
        let n = rows.len();
        let min_leaf = self.settings.min_samples_leaf;
        let total_sum: f64 = rows.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = rows.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;

        let mut best: Option<SplitCandidate> = None;
        let mut order = rows.to_vec();
        for feature in 0..self.x.ncols() {
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for split in 1..n {
                let prev = order[split - 1];
                left_sum += self.y[prev];
                left_sq += self.y[prev] * self.y[prev];

                let lo = self.x[[prev, feature]];
                let hi = self.x[[order[split], feature]];
                if lo == hi || split < min_leaf || n - split < min_leaf {
                    continue;
                }

                let (nl, nr) = (split as f64, (n - split) as f64);
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / nl) + (right_sq - right_sum * right_sum / nr);
                let gain = parent_sse - sse;

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

impl Estimator for DecisionTree {
    type Fitted = FittedDecisionTree;

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<FittedDecisionTree, ModelError> {
        self.validate()?;
        check_fit_input(&x, &y)?;

        let mut grower = Grower {
            settings: self,
            x: x.view(),
            y: y.view(),
            nodes: Vec::new(),
        };
        grower.grow((0..x.nrows()).collect(), 0);
        debug!(nodes = grower.nodes.len(), "decision tree grown");

        Ok(FittedDecisionTree {
            nodes: grower.nodes,
            n_features: x.ncols(),
        })
    }

    fn name(&self) -> &str {
        "tree"
    }
}

/// Fitted [`DecisionTree`]. Node `0` is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedDecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

impl FittedDecisionTree {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        walk(&self.nodes, 0)
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if row[feature] <= threshold { left } else { right },
            }
        }
    }
}

impl Predictor for FittedDecisionTree {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        check_predict_input(&x, self.n_features)?;
        Ok(x.axis_iter(Axis(0)).map(|row| self.predict_row(row)).collect())
    }
}

impl PersistentModel for FittedDecisionTree {
    type Params = FittedDecisionTree;

    fn extract_params(&self) -> FittedDecisionTree {
        self.clone()
    }

    fn from_params(params: FittedDecisionTree) -> Result<Self, ModelError> {
        let n = params.nodes.len();
        if n == 0 {
            return Err(ModelError::Serialization("tree has no nodes".into()));
        }
        // children always come after their parent, which also rules out cycles
        for (id, node) in params.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if left <= id || right <= id || left >= n || right >= n {
                    return Err(ModelError::Serialization(format!(
                        "node {} has invalid children {} / {}",
                        id, left, right
                    )));
                }
                if feature >= params.n_features {
                    return Err(ModelError::Serialization(format!(
                        "node {} splits on feature {} of {}",
                        id, feature, params.n_features
                    )));
                }
            }
        }
        Ok(params)
    }
}

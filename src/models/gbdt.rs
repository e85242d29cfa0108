//! Gradient boosted decision trees for binary churn classification
//!
//! Trees are stored as flat node vectors (node 0 is the root) so a model
//! serializes to plain JSON and evaluates without recursion.

use crate::errors::{ArtifactKind, ChurnError, Result};
use serde::{Deserialize, Serialize};

/// Hyper-parameters of one boosted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows sampled for each tree
    pub subsample: f64,
    /// Minimum hessian sum in each child of a split
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.1,
            subsample: 1.0,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
        }
    }
}

/// A tree node: a split when `value` is `None`, otherwise a leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Feature index to split on
    pub feature: usize,
    /// Rows with `x < threshold` go left
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    pub value: Option<f64>,
}

impl Node {
    pub fn leaf(value: f64) -> Self {
        Self {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }

    pub fn split(feature: usize, threshold: f64, left: usize, right: usize) -> Self {
        Self {
            feature,
            threshold,
            left,
            right,
            value: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }
}

/// One regression tree over the margin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Leaf value reached by `features`
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        while let Some(node) = self.nodes.get(idx) {
            if let Some(value) = node.value {
                return value;
            }
            idx = if features[node.feature] < node.threshold {
                node.left
            } else {
                node.right
            };
        }
        0.0
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    1 + walk(nodes, node.left).max(walk(nodes, node.right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    /// Check structure: children exist and point forward, features in range
    pub fn validate(&self, feature_count: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node.value {
                Some(v) if !v.is_finite() => {
                    return Err(format!("node {i} has non-finite leaf value"));
                }
                Some(_) => {}
                None => {
                    if node.feature >= feature_count {
                        return Err(format!(
                            "node {i} splits on feature {} of {feature_count}",
                            node.feature
                        ));
                    }
                    if !node.threshold.is_finite() {
                        return Err(format!("node {i} has non-finite threshold"));
                    }
                    for child in [node.left, node.right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Trained churn classifier: logistic-loss boosted trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    /// Initial margin, the log-odds of the training positive rate
    pub base_margin: f64,
    pub feature_count: usize,
    pub params: BoosterParams,
    pub trees: Vec<Tree>,
}

impl BoostedTrees {
    pub fn new(
        base_margin: f64,
        feature_count: usize,
        params: BoosterParams,
        trees: Vec<Tree>,
    ) -> Self {
        Self {
            base_margin,
            feature_count,
            params,
            trees,
        }
    }

    /// Raw additive score before the sigmoid
    pub fn predict_margin(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.feature_count {
            return Err(ChurnError::ArtifactMismatch(format!(
                "model expects {} features, got {}",
                self.feature_count,
                features.len()
            )));
        }
        Ok(self.base_margin + self.trees.iter().map(|t| t.evaluate(features)).sum::<f64>())
    }

    /// Churn probability for one aligned feature row
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64> {
        self.predict_margin(features).map(sigmoid)
    }

    /// Structural check run when a model artifact is loaded
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ChurnError::InvalidArtifact {
            kind: ArtifactKind::Model,
            reason,
        };
        if !self.base_margin.is_finite() {
            return Err(invalid("non-finite base margin".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count)
                .map_err(|e| invalid(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }
}

pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Inverse of [`sigmoid`]
pub fn log_odds(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

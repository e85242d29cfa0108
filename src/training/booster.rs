//! Gradient boosted tree trainer with logistic loss

use crate::errors::{ChurnError, Result};
use crate::models::gbdt::{log_odds, sigmoid, BoostedTrees, BoosterParams};
use crate::training::cart::{CartBuilder, TreeConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/// Clamp for the base rate so the initial log-odds stay finite
const RATE_EPS: f64 = 1e-6;
/// Floor for per-row hessians
const HESSIAN_EPS: f64 = 1e-16;

/// Trains a [`BoostedTrees`] classifier for one parameter set
#[derive(Debug, Clone)]
pub struct GbdtTrainer {
    params: BoosterParams,
    seed: u64,
}

impl GbdtTrainer {
    pub fn new(params: BoosterParams, seed: u64) -> Self {
        Self { params, seed }
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    /// Fit on dense feature rows and 0/1 labels
    pub fn train(&self, features: &[Vec<f64>], labels: &[u8]) -> Result<BoostedTrees> {
        let n = features.len();
        if n == 0 {
            return Err(ChurnError::Training("no training rows".to_string()));
        }
        if labels.len() != n {
            return Err(ChurnError::Training(format!(
                "{n} feature rows but {} labels",
                labels.len()
            )));
        }
        let feature_count = features[0].len();
        if features.iter().any(|row| row.len() != feature_count) {
            return Err(ChurnError::Training(
                "feature rows have differing lengths".to_string(),
            ));
        }

        let targets: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        let positive_rate = targets.iter().sum::<f64>() / n as f64;
        let base_margin = log_odds(positive_rate.clamp(RATE_EPS, 1.0 - RATE_EPS));

        let mut margins = vec![base_margin; n];
        let mut gradients = vec![0.0; n];
        let mut hessians = vec![0.0; n];
        let mut rng = StdRng::seed_from_u64(self.seed);
        let sample_size = ((n as f64 * self.params.subsample).round() as usize).clamp(1, n);

        let config = TreeConfig {
            max_depth: self.params.max_depth,
            min_child_weight: self.params.min_child_weight,
            reg_lambda: self.params.reg_lambda,
            learning_rate: self.params.learning_rate,
        };

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for round in 0..self.params.n_estimators {
            for i in 0..n {
                let p = sigmoid(margins[i]);
                gradients[i] = p - targets[i];
                hessians[i] = (p * (1.0 - p)).max(HESSIAN_EPS);
            }

            let rows: Vec<usize> = if sample_size < n {
                let mut rows = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                rows.sort_unstable();
                rows
            } else {
                (0..n).collect()
            };

            let tree = CartBuilder::new(features, &gradients, &hessians, config.clone()).build(&rows);
            for (margin, row) in margins.iter_mut().zip(features) {
                *margin += tree.evaluate(row);
            }

            debug!(
                round = round + 1,
                of = self.params.n_estimators,
                nodes = tree.nodes.len(),
                "Tree trained"
            );
            trees.push(tree);
        }

        Ok(BoostedTrees::new(
            base_margin,
            feature_count,
            self.params.clone(),
            trees,
        ))
    }
}

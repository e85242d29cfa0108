//! Regression tree builder for gradient boosting
//!
//! Exact-greedy split search on second-order statistics. Split candidates
//! are visited feature by feature with ascending thresholds and only a
//! strictly larger gain replaces the current best, so ties resolve to the
//! first feature and then the lowest threshold.

use crate::models::gbdt::{Node, Tree};

/// Minimum gain for a split to be kept
const MIN_GAIN: f64 = 1e-12;

/// Growth parameters for a single tree
#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    /// Shrinkage applied to leaf weights
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Builds one tree from per-row gradients and hessians
pub struct CartBuilder<'a> {
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    feature_count: usize,
    config: TreeConfig,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), gradients.len());
        debug_assert_eq!(features.len(), hessians.len());

        let feature_count = features.first().map_or(0, Vec::len);
        Self {
            features,
            gradients,
            hessians,
            feature_count,
            config,
        }
    }

    /// Grow a tree on the given rows
    pub fn build(&self, rows: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(rows, 0, &mut nodes);
        Tree::new(nodes)
    }

    fn build_node(&self, rows: &[usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
        let current = nodes.len();
        let (g, h) = self.sums(rows);

        let split = if depth < self.config.max_depth && rows.len() >= 2 {
            self.find_best_split(rows, g, h)
        } else {
            None
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(self.leaf_weight(g, h)));
            return current;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.features[r][split.feature] < split.threshold);

        // Placeholder, children are patched in once built
        nodes.push(Node::split(split.feature, split.threshold, 0, 0));
        let left = self.build_node(&left_rows, depth + 1, nodes);
        let right = self.build_node(&right_rows, depth + 1, nodes);
        nodes[current].left = left;
        nodes[current].right = right;

        current
    }

    fn find_best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let lambda = self.config.reg_lambda;
        let parent_score = g * g / (h + lambda);
        let mut best: Option<SplitCandidate> = None;
        let mut sorted = rows.to_vec();

        for feature in 0..self.feature_count {
            sorted.sort_by(|&a, &b| {
                self.features[a][feature]
                    .total_cmp(&self.features[b][feature])
                    .then(a.cmp(&b))
            });

            let mut gl = 0.0;
            let mut hl = 0.0;
            for pair in sorted.windows(2) {
                let (row, next) = (pair[0], pair[1]);
                gl += self.gradients[row];
                hl += self.hessians[row];

                let value = self.features[row][feature];
                let next_value = self.features[next][feature];
                if value == next_value {
                    continue;
                }

                let hr = h - hl;
                if hl < self.config.min_child_weight || hr < self.config.min_child_weight {
                    continue;
                }
                let gr = g - gl;
                let gain =
                    0.5 * (gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent_score);
                if gain <= MIN_GAIN || best.is_some_and(|b| gain <= b.gain) {
                    continue;
                }

                best = Some(SplitCandidate {
                    feature,
                    threshold: midpoint(value, next_value),
                    gain,
                });
            }
        }

        best
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &r| {
            (g + self.gradients[r], h + self.hessians[r])
        })
    }

    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        let denominator = h + self.config.reg_lambda;
        if denominator <= 0.0 {
            return 0.0;
        }
        -self.config.learning_rate * g / denominator
    }
}

/// Threshold strictly above `low` and at most `high`
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid > low {
        mid
    } else {
        high
    }
}

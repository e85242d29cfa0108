//! Randomized hyper-parameter search with stratified cross-validation

use crate::errors::{ChurnError, Result};
use crate::models::gbdt::BoosterParams;
use crate::training::booster::GbdtTrainer;
use crate::training::scoring::Scoring;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Threshold used when scoring thresholded metrics during search
const SEARCH_THRESHOLD: f64 = 0.5;

/// Discrete grid of candidate values per hyper-parameter.
///
/// A dimension left out of the configuration holds the single default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamSpace {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub subsample: Vec<f64>,
    pub min_child_weight: Vec<f64>,
    pub reg_lambda: Vec<f64>,
}

impl Default for ParamSpace {
    fn default() -> Self {
        let d = BoosterParams::default();
        Self {
            n_estimators: vec![d.n_estimators],
            max_depth: vec![d.max_depth],
            learning_rate: vec![d.learning_rate],
            subsample: vec![d.subsample],
            min_child_weight: vec![d.min_child_weight],
            reg_lambda: vec![d.reg_lambda],
        }
    }
}

impl ParamSpace {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ChurnError::Training(format!("param_space: {msg}")));

        if self.dimensions().contains(&0) {
            return invalid("every dimension needs at least one value");
        }
        if self.n_estimators.contains(&0) || self.max_depth.contains(&0) {
            return invalid("n_estimators and max_depth must be positive");
        }
        if self.learning_rate.iter().any(|&v| !(v > 0.0 && v.is_finite())) {
            return invalid("learning_rate must be positive");
        }
        if self.subsample.iter().any(|&v| !(v > 0.0 && v <= 1.0)) {
            return invalid("subsample must be within (0, 1]");
        }
        if self
            .min_child_weight
            .iter()
            .chain(&self.reg_lambda)
            .any(|&v| !(v >= 0.0 && v.is_finite()))
        {
            return invalid("min_child_weight and reg_lambda must be non-negative");
        }
        Ok(())
    }

    fn dimensions(&self) -> [usize; 6] {
        [
            self.n_estimators.len(),
            self.max_depth.len(),
            self.learning_rate.len(),
            self.subsample.len(),
            self.min_child_weight.len(),
            self.reg_lambda.len(),
        ]
    }

    /// Number of distinct parameter combinations
    pub fn grid_size(&self) -> usize {
        self.dimensions().iter().product()
    }

    /// Combination at `index` of the grid, last dimension varying fastest
    pub fn candidate(&self, index: usize) -> BoosterParams {
        let dims = self.dimensions();
        let mut digits = [0usize; 6];
        let mut rest = index;
        for (digit, &dim) in digits.iter_mut().zip(&dims).rev() {
            *digit = rest % dim;
            rest /= dim;
        }
        BoosterParams {
            n_estimators: self.n_estimators[digits[0]],
            max_depth: self.max_depth[digits[1]],
            learning_rate: self.learning_rate[digits[2]],
            subsample: self.subsample[digits[3]],
            min_child_weight: self.min_child_weight[digits[4]],
            reg_lambda: self.reg_lambda[digits[5]],
        }
    }

    /// Up to `n_iter` distinct combinations sampled without replacement
    pub fn sample(&self, n_iter: usize, seed: u64) -> Vec<BoosterParams> {
        let size = self.grid_size();
        let amount = n_iter.min(size);
        let mut rng = StdRng::seed_from_u64(seed);
        rand::seq::index::sample(&mut rng, size, amount)
            .into_iter()
            .map(|i| self.candidate(i))
            .collect()
    }
}

/// Stratified k-fold splitter with seeded shuffling
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    /// `(train, test)` index pairs; each class is dealt round-robin over folds
    pub fn split(&self, labels: &[u8]) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if self.n_splits < 2 {
            return Err(ChurnError::Training(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.n_splits
            )));
        }
        if labels.len() < self.n_splits {
            return Err(ChurnError::Training(format!(
                "cannot split {} rows into {} folds",
                labels.len(),
                self.n_splits
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut folds = vec![Vec::new(); self.n_splits];
        let mut next_fold = 0;
        for mut indices in group_by_class(labels).into_values() {
            indices.shuffle(&mut rng);
            for index in indices {
                folds[next_fold].push(index);
                next_fold = (next_fold + 1) % self.n_splits;
            }
        }

        Ok((0..self.n_splits)
            .map(|k| {
                let mut test = folds[k].clone();
                test.sort_unstable();
                let mut train: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != k)
                    .flat_map(|(_, fold)| fold.iter().copied())
                    .collect();
                train.sort_unstable();
                (train, test)
            })
            .collect())
    }
}

fn group_by_class(labels: &[u8]) -> BTreeMap<u8, Vec<usize>> {
    let mut classes: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        classes.entry(label).or_default().push(i);
    }
    classes
}

/// Stratified, seeded train/test split returning sorted `(train, test)` indices
pub fn train_test_split(
    labels: &[u8],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ChurnError::Training(format!(
            "test_size must be within (0, 1), got {test_size}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for mut indices in group_by_class(labels).into_values() {
        indices.shuffle(&mut rng);
        let n_test = (indices.len() as f64 * test_size).round() as usize;
        let n_test = n_test.min(indices.len().saturating_sub(1));
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    if train.is_empty() || test.is_empty() {
        return Err(ChurnError::Training(format!(
            "{} rows are too few for a {test_size} test split",
            labels.len()
        )));
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Cross-validated score of one sampled candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub params: BoosterParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Result of a randomized search
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub best_params: BoosterParams,
    pub best_score: f64,
    /// Every candidate in sampling order
    pub candidates: Vec<CandidateScore>,
}

/// Randomized search over a [`ParamSpace`]
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    pub space: ParamSpace,
    pub n_iter: usize,
    pub cv_folds: usize,
    pub scoring: Scoring,
    pub seed: u64,
}

impl RandomizedSearch {
    /// Score sampled candidates in parallel and pick the best.
    ///
    /// The highest mean fold score wins; ties go to the earliest sampled
    /// candidate.
    pub fn run(&self, features: &[Vec<f64>], labels: &[u8]) -> Result<SearchOutcome> {
        self.space.validate()?;
        let folds = StratifiedKFold::new(self.cv_folds, self.seed).split(labels)?;
        let candidates = self.space.sample(self.n_iter, self.seed);

        info!(
            candidates = candidates.len(),
            grid_size = self.space.grid_size(),
            folds = folds.len(),
            scoring = %self.scoring,
            "Starting randomized search"
        );

        let scored = candidates
            .into_par_iter()
            .map(|params| self.evaluate(params, features, labels, &folds))
            .collect::<Result<Vec<_>>>()?;

        let mut best: Option<&CandidateScore> = None;
        for candidate in &scored {
            if best.map_or(true, |b| candidate.mean_score > b.mean_score) {
                best = Some(candidate);
            }
        }
        let best = best
            .cloned()
            .ok_or_else(|| ChurnError::Training("search produced no candidates".to_string()))?;

        info!(
            best_score = best.mean_score,
            params = ?best.params,
            "Randomized search complete"
        );

        Ok(SearchOutcome {
            best_params: best.params,
            best_score: best.mean_score,
            candidates: scored,
        })
    }

    fn evaluate(
        &self,
        params: BoosterParams,
        features: &[Vec<f64>],
        labels: &[u8],
        folds: &[(Vec<usize>, Vec<usize>)],
    ) -> Result<CandidateScore> {
        let trainer = GbdtTrainer::new(params, self.seed);
        let mut fold_scores = Vec::with_capacity(folds.len());

        for (train, test) in folds {
            let train_x: Vec<Vec<f64>> = train.iter().map(|&i| features[i].clone()).collect();
            let train_y: Vec<u8> = train.iter().map(|&i| labels[i]).collect();
            let model = trainer.train(&train_x, &train_y)?;

            let test_y: Vec<u8> = test.iter().map(|&i| labels[i]).collect();
            let probabilities = test
                .iter()
                .map(|&i| model.predict_proba(&features[i]))
                .collect::<Result<Vec<_>>>()?;

            let score = self.scoring.score(&test_y, &probabilities, SEARCH_THRESHOLD);
            fold_scores.push(if score.is_nan() { f64::NEG_INFINITY } else { score });
        }

        let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        debug!(params = ?trainer.params(), mean_score, "Candidate scored");

        Ok(CandidateScore {
            params: trainer.params().clone(),
            fold_scores,
            mean_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn space() -> ParamSpace {
        ParamSpace {
            n_estimators: vec![5, 10],
            max_depth: vec![1, 2, 3],
            learning_rate: vec![0.1, 0.3],
            subsample: vec![1.0],
            min_child_weight: vec![1.0],
            reg_lambda: vec![1.0],
        }
    }

    #[test]
    fn test_grid_decoding() {
        let space = space();
        assert_eq!(space.grid_size(), 12);
        let all: Vec<BoosterParams> = (0..12).map(|i| space.candidate(i)).collect();
        assert_eq!(all[0].n_estimators, 5);
        assert_eq!(all[0].max_depth, 1);
        assert_eq!(all[0].learning_rate, 0.1);
        assert_eq!(all[1].learning_rate, 0.3);
        assert_eq!(all[11].n_estimators, 10);
        assert_eq!(all[11].max_depth, 3);

        let distinct: HashSet<String> = all.iter().map(|p| format!("{p:?}")).collect();
        assert_eq!(distinct.len(), 12);
    }

    #[test]
    fn test_sampling_caps_and_repeats() {
        let space = space();
        assert_eq!(space.sample(50, 1).len(), 12);
        assert_eq!(space.sample(4, 9), space.sample(4, 9));

        let picked: HashSet<String> = space.sample(8, 3).iter().map(|p| format!("{p:?}")).collect();
        assert_eq!(picked.len(), 8);
    }

    #[test]
    fn test_validate_space() {
        assert!(space().validate().is_ok());
        assert!(ParamSpace::default().validate().is_ok());

        let mut bad = space();
        bad.subsample = vec![1.5];
        assert!(bad.validate().is_err());
        let mut empty = space();
        empty.max_depth.clear();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_stratified_folds() {
        let labels: Vec<u8> = (0..30).map(|i| u8::from(i % 3 == 0)).collect();
        let folds = StratifiedKFold::new(3, 42).split(&labels).unwrap();
        assert_eq!(folds.len(), 3);

        let mut seen = Vec::new();
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 30);
            let positives = test.iter().filter(|&&i| labels[i] == 1).count();
            assert!((3..=4).contains(&positives), "{positives}");
            assert!(train.iter().all(|i| !test.contains(i)));
            seen.extend(test.iter().copied());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..30).collect::<Vec<_>>());
        assert_eq!(folds, StratifiedKFold::new(3, 42).split(&labels).unwrap());
    }

    #[test]
    fn test_train_test_split() {
        let labels: Vec<u8> = (0..100).map(|i| u8::from(i < 25)).collect();
        let (train, test) = train_test_split(&labels, 0.2, 42).unwrap();

        assert_eq!(test.len(), 20);
        assert_eq!(train.len(), 80);
        assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 5);
        assert_eq!((train, test), train_test_split(&labels, 0.2, 42).unwrap());

        assert!(train_test_split(&labels, 1.0, 42).is_err());
        assert!(train_test_split(&[1], 0.2, 42).is_err());
    }

    #[test]
    fn test_search_is_deterministic() {
        let features: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let labels: Vec<u8> = (0..60).map(|i| u8::from(i >= 30)).collect();
        let search = RandomizedSearch {
            space: space(),
            n_iter: 4,
            cv_folds: 3,
            scoring: Scoring::RocAuc,
            seed: 42,
        };

        let a = search.run(&features, &labels).unwrap();
        let b = search.run(&features, &labels).unwrap();

        assert_eq!(a.candidates.len(), 4);
        assert_eq!(a.best_params, b.best_params);
        assert_eq!(a.candidates, b.candidates);
        let max = a
            .candidates
            .iter()
            .map(|c| c.mean_score)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(a.best_score, max);
        // Ties resolve to the earliest sampled candidate
        let first_best = a.candidates.iter().find(|c| c.mean_score == max).unwrap();
        assert_eq!(first_best.params, a.best_params);
    }
}

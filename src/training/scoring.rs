//! Binary classification metrics used for model selection and evaluation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric optimized by the hyper-parameter search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    F1,
    Accuracy,
    Precision,
    Recall,
    RocAuc,
}

impl Scoring {
    /// Score predictions for `labels`; thresholded metrics use `threshold`
    pub fn score(self, labels: &[u8], probabilities: &[f64], threshold: f64) -> f64 {
        let matrix = || ConfusionMatrix::from_probabilities(labels, probabilities, threshold);
        match self {
            Scoring::F1 => matrix().f1(),
            Scoring::Accuracy => matrix().accuracy(),
            Scoring::Precision => matrix().precision(),
            Scoring::Recall => matrix().recall(),
            Scoring::RocAuc => roc_auc(labels, probabilities),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scoring::F1 => "f1",
            Scoring::Accuracy => "accuracy",
            Scoring::Precision => "precision",
            Scoring::Recall => "recall",
            Scoring::RocAuc => "roc_auc",
        };
        f.write_str(name)
    }
}

impl FromStr for Scoring {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "f1" => Ok(Scoring::F1),
            "accuracy" => Ok(Scoring::Accuracy),
            "precision" => Ok(Scoring::Precision),
            "recall" => Ok(Scoring::Recall),
            "roc_auc" => Ok(Scoring::RocAuc),
            other => Err(format!(
                "unknown scoring `{other}` (expected f1, accuracy, precision, recall or roc_auc)"
            )),
        }
    }
}

/// Counts of a thresholded binary prediction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn from_probabilities(labels: &[u8], probabilities: &[f64], threshold: f64) -> Self {
        let mut matrix = Self::default();
        for (&label, &p) in labels.iter().zip(probabilities) {
            match (label == 1, p > threshold) {
                (true, true) => matrix.true_positive += 1,
                (false, true) => matrix.false_positive += 1,
                (false, false) => matrix.true_negative += 1,
                (true, false) => matrix.false_negative += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        ratio(
            2 * self.true_positive,
            2 * self.true_positive + self.false_positive + self.false_negative,
        )
    }
}

/// Zero when the denominator is empty
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Area under the ROC curve via the rank-sum statistic, averaging ties.
///
/// Returns 0.5 when only one class is present.
pub fn roc_auc(labels: &[u8], probabilities: &[f64]) -> f64 {
    let n = labels.len().min(probabilities.len());
    let positives = labels[..n].iter().filter(|&&l| l == 1).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && probabilities[order[j + 1]] == probabilities[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their average
        let rank = (i + j + 2) as f64 / 2.0;
        positive_rank_sum += rank * order[i..=j].iter().filter(|&&k| labels[k] == 1).count() as f64;
        i = j + 1;
    }

    let positives = positives as f64;
    (positive_rank_sum - positives * (positives + 1.0) / 2.0) / (positives * negatives as f64)
}

/// Held-out evaluation of a trained classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
    pub support: usize,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn new(labels: &[u8], probabilities: &[f64], threshold: f64) -> Self {
        let confusion = ConfusionMatrix::from_probabilities(labels, probabilities, threshold);
        Self {
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            roc_auc: roc_auc(labels, probabilities),
            support: confusion.total(),
            confusion,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "accuracy  {:.4}", self.accuracy)?;
        writeln!(f, "precision {:.4}", self.precision)?;
        writeln!(f, "recall    {:.4}", self.recall)?;
        writeln!(f, "f1        {:.4}", self.f1)?;
        writeln!(f, "roc_auc   {:.4}", self.roc_auc)?;
        write!(
            f,
            "confusion tp={} fp={} tn={} fn={} (n={})",
            self.confusion.true_positive,
            self.confusion.false_positive,
            self.confusion.true_negative,
            self.confusion.false_negative,
            self.support
        )
    }
}

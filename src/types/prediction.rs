//! Prediction results returned by the inference service

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary churn outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnLabel {
    NoChurn,
    Churn,
}

impl ChurnLabel {
    /// Label for a churn probability; churn only strictly above the threshold
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            ChurnLabel::Churn
        } else {
            ChurnLabel::NoChurn
        }
    }

    /// Wire representation: 1 for churn, 0 otherwise
    pub fn as_u8(self) -> u8 {
        match self {
            ChurnLabel::NoChurn => 0,
            ChurnLabel::Churn => 1,
        }
    }
}

impl fmt::Display for ChurnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChurnLabel::NoChurn => write!(f, "No Churn"),
            ChurnLabel::Churn => write!(f, "Churn"),
        }
    }
}

/// Outcome of running one record through encode -> align -> classify
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChurnPrediction {
    pub label: ChurnLabel,

    /// Churn probability (0.0 - 1.0)
    pub probability: f64,

    /// Aligned feature vector was all zeros
    pub feature_mismatch: bool,
}

impl ChurnPrediction {
    pub fn new(probability: f64, threshold: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        Self {
            label: ChurnLabel::from_probability(probability, threshold),
            probability,
            feature_mismatch: false,
        }
    }

    pub fn with_feature_mismatch(mut self, feature_mismatch: bool) -> Self {
        self.feature_mismatch = feature_mismatch;
        self
    }

    /// Probability as a percentage, e.g. for display
    pub fn probability_percent(&self) -> f64 {
        self.probability * 100.0
    }
}

/// REST response body: `{"prediction": 0|1}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: u8,
}

impl From<&ChurnPrediction> for PredictionResponse {
    fn from(prediction: &ChurnPrediction) -> Self {
        Self {
            prediction: prediction.label.as_u8(),
        }
    }
}

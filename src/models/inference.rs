//! Churn inference service: encode -> align -> classify

use crate::config::AppConfig;
use crate::errors::{ChurnError, Result};
use crate::features::{batch_is_all_zero, EncodedRow};
use crate::models::loader::{ArtifactPaths, ArtifactSet};
use crate::types::{ChurnPrediction, RawRecord};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Immutable prediction service over one loaded artifact set.
///
/// Shared between request handlers behind an `Arc`; every call runs its own
/// private encode/align/predict pipeline.
#[derive(Debug)]
pub struct InferenceService {
    artifacts: ArtifactSet,
    /// Decision threshold on the churn probability
    threshold: f64,
    /// Fail requests whose aligned features are all zero instead of warning
    strict_feature_check: bool,
}

impl InferenceService {
    pub fn new(artifacts: ArtifactSet, threshold: f64, strict_feature_check: bool) -> Self {
        info!(
            run_id = %artifacts.run_id(),
            threshold = threshold,
            strict_feature_check = strict_feature_check,
            "Inference service initialized"
        );
        Self {
            artifacts,
            threshold,
            strict_feature_check,
        }
    }

    /// Load artifacts from the configured paths
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let paths = config.model.artifact_paths();
        Self::load(
            &paths,
            config.inference.threshold,
            config.inference.strict_feature_check,
        )
    }

    pub fn load(paths: &ArtifactPaths, threshold: f64, strict_feature_check: bool) -> Result<Self> {
        let artifacts = ArtifactSet::load(paths)?;
        Ok(Self::new(artifacts, threshold, strict_feature_check))
    }

    pub fn run_id(&self) -> Uuid {
        self.artifacts.run_id()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn feature_count(&self) -> usize {
        self.artifacts.columns.len()
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Predict churn for a single record
    pub fn predict(&self, record: &RawRecord) -> Result<ChurnPrediction> {
        let mut predictions = self.predict_batch(std::slice::from_ref(record))?;
        predictions
            .pop()
            .ok_or_else(|| ChurnError::Training("empty prediction batch".to_string()))
    }

    /// Predict churn for a batch of records
    pub fn predict_batch(&self, records: &[RawRecord]) -> Result<Vec<ChurnPrediction>> {
        let start = Instant::now();

        let rows = self.features(records)?;
        let mismatch = batch_is_all_zero(&rows);
        if mismatch {
            if self.strict_feature_check {
                return Err(ChurnError::FeatureMismatch);
            }
            warn!(
                batch = records.len(),
                run_id = %self.run_id(),
                "Aligned features are all zero; input likely does not match the training schema"
            );
        }

        let predictions = rows
            .iter()
            .map(|row| {
                let probability = self.artifacts.model.predict_proba(row.values())?;
                Ok(ChurnPrediction::new(probability, self.threshold).with_feature_mismatch(mismatch))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            batch = records.len(),
            latency_us = start.elapsed().as_micros() as u64,
            "Prediction complete"
        );
        Ok(predictions)
    }

    /// Encoded and aligned feature rows, as fed to the classifier
    pub fn features(&self, records: &[RawRecord]) -> Result<Vec<EncodedRow>> {
        let encoded = self.artifacts.encoder.encode(records)?;
        Ok(self.artifacts.columns.align(&encoded))
    }
}

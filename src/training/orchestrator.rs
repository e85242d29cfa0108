//! End-to-end offline training run

use crate::config::{AppConfig, TrainingConfig};
use crate::errors::{ChurnError, Result};
use crate::features::{FeatureEncoder, TrainingColumns};
use crate::models::{ArtifactPaths, ArtifactSet, RunInfo};
use crate::training::booster::GbdtTrainer;
use crate::training::dataset::Dataset;
use crate::training::scoring::ClassificationReport;
use crate::training::search::{train_test_split, RandomizedSearch, SearchOutcome};
use crate::types::RawRecord;
use std::time::Instant;
use tracing::info;

/// Everything a finished training run produced
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifacts: ArtifactSet,
    pub search: SearchOutcome,
    /// Held-out evaluation of the refitted model
    pub report: ClassificationReport,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Runs ingestion, split, encoding, search, refit, evaluation and save
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    settings: TrainingConfig,
    threshold: f64,
}

impl TrainingOrchestrator {
    pub fn new(settings: TrainingConfig, threshold: f64) -> Self {
        Self {
            settings,
            threshold,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.training.clone(), config.inference.threshold)
    }

    pub fn settings(&self) -> &TrainingConfig {
        &self.settings
    }

    /// Train on the configured dataset and write the artifact set
    pub fn run(&self, config: &AppConfig) -> Result<TrainingOutcome> {
        let dataset = Dataset::from_csv(&config.data.raw_path, &config.data.target_column)?;
        let outcome = self.fit(&dataset)?;
        outcome.artifacts.save(&config.model.artifact_paths())?;
        Ok(outcome)
    }

    /// Train and save to explicit artifact paths
    pub fn run_to(&self, dataset: &Dataset, paths: &ArtifactPaths) -> Result<TrainingOutcome> {
        let outcome = self.fit(dataset)?;
        outcome.artifacts.save(paths)?;
        Ok(outcome)
    }

    /// Train without touching the filesystem
    pub fn fit(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let settings = &self.settings;

        let (train_idx, test_idx) =
            train_test_split(&dataset.labels, settings.test_size, settings.seed)?;
        let (train_records, train_labels) = dataset.subset(&train_idx);
        let (test_records, test_labels) = dataset.subset(&test_idx);
        info!(
            train = train_idx.len(),
            test = test_idx.len(),
            test_size = settings.test_size,
            "Dataset split"
        );

        let encoder = FeatureEncoder::fit(&train_records)?;
        let columns = TrainingColumns::new(encoder.output_columns()?);
        let train_x = dense(&encoder, &columns, &train_records)?;
        info!(features = columns.len(), "Feature encoder fitted");

        let search = RandomizedSearch {
            space: settings.param_space.clone(),
            n_iter: settings.n_iter,
            cv_folds: settings.cv_folds,
            scoring: settings.scoring,
            seed: settings.seed,
        }
        .run(&train_x, &train_labels)?;

        let model = GbdtTrainer::new(search.best_params.clone(), settings.seed)
            .train(&train_x, &train_labels)?;

        let test_x = dense(&encoder, &columns, &test_records)?;
        let probabilities = test_x
            .iter()
            .map(|row| model.predict_proba(row))
            .collect::<Result<Vec<_>>>()?;
        let report = ClassificationReport::new(&test_labels, &probabilities, self.threshold);

        info!(
            accuracy = report.accuracy,
            precision = report.precision,
            recall = report.recall,
            f1 = report.f1,
            roc_auc = report.roc_auc,
            support = report.support,
            "Held-out evaluation"
        );

        let run = RunInfo::new();
        let artifacts = ArtifactSet::new(run, model, encoder, columns)?;
        info!(
            run_id = %run.run_id,
            best_score = search.best_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training complete"
        );

        Ok(TrainingOutcome {
            artifacts,
            search,
            report,
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
        })
    }
}

/// Encode and align records into plain feature vectors
fn dense(
    encoder: &FeatureEncoder,
    columns: &TrainingColumns,
    records: &[RawRecord],
) -> Result<Vec<Vec<f64>>> {
    let encoded = encoder.encode(records)?;
    let rows: Vec<Vec<f64>> = columns
        .align(&encoded)
        .into_iter()
        .map(|row| row.into_values())
        .collect();
    if rows.is_empty() {
        return Err(ChurnError::Training("no rows to encode".to_string()));
    }
    Ok(rows)
}

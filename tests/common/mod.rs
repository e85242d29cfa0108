#![allow(dead_code)]

use churn_prediction_pipeline::config::TrainingConfig;
use churn_prediction_pipeline::schema::TARGET_FIELD;
use churn_prediction_pipeline::training::synthetic::{write_csv, CustomerGenerator};
use churn_prediction_pipeline::training::{Dataset, ParamSpace, Scoring, TrainingOrchestrator};
use churn_prediction_pipeline::{ArtifactPaths, RawRecord, TrainingOutcome};
use std::path::Path;

/// Small, fast training settings
pub fn settings(seed: u64) -> TrainingConfig {
    TrainingConfig {
        test_size: 0.2,
        cv_folds: 2,
        n_iter: 2,
        scoring: Scoring::F1,
        seed,
        param_space: ParamSpace {
            n_estimators: vec![15, 25],
            max_depth: vec![3],
            learning_rate: vec![0.2],
            subsample: vec![0.9],
            min_child_weight: vec![1.0],
            reg_lambda: vec![1.0],
        },
    }
}

pub fn synthetic_dataset(rows: usize, seed: u64) -> Dataset {
    let records: Vec<RawRecord> = CustomerGenerator::new(seed).take(rows).collect();
    let mut buffer = Vec::new();
    write_csv(&mut buffer, &records).unwrap();
    Dataset::from_reader(buffer.as_slice(), TARGET_FIELD).unwrap()
}

/// Train on synthetic data and write the artifacts into `dir`
pub fn train_into(dir: &Path) -> (ArtifactPaths, TrainingOutcome) {
    let paths = ArtifactPaths::in_dir(dir);
    let outcome = TrainingOrchestrator::new(settings(42), 0.5)
        .run_to(&synthetic_dataset(300, 7), &paths)
        .unwrap();
    (paths, outcome)
}

/// New fiber customer on a month-to-month contract
pub fn scenario_record() -> RawRecord {
    RawRecord::new()
        .with("gender", "Female")
        .with("SeniorCitizen", "No")
        .with("Partner", "No")
        .with("Dependents", "No")
        .with("tenure", 3u32)
        .with("PhoneService", "Yes")
        .with("MultipleLines", "Yes")
        .with("InternetService", "Fiber optic")
        .with("OnlineSecurity", "No")
        .with("OnlineBackup", "No")
        .with("DeviceProtection", "No")
        .with("TechSupport", "No")
        .with("StreamingTV", "Yes")
        .with("StreamingMovies", "Yes")
        .with("Contract", "Month-to-month")
        .with("PaperlessBilling", "Yes")
        .with("PaymentMethod", "Electronic check")
        .with("MonthlyCharges", 95.5)
        .with("TotalCharges", 280.0)
}

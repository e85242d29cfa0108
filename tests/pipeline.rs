//! Training -> artifacts -> inference, through the public API

mod common;

use churn_prediction_pipeline::errors::ArtifactKind;
use churn_prediction_pipeline::{ArtifactPaths, ChurnError, InferenceService};
use common::{scenario_record, train_into};
use tempfile::TempDir;

#[test]
fn scenario_record_predicts_deterministically() {
    let dir = TempDir::new().unwrap();
    let (paths, outcome) = train_into(dir.path());

    let first = InferenceService::load(&paths, 0.5, false).unwrap();
    let second = InferenceService::load(&paths, 0.5, false).unwrap();
    assert_eq!(first.run_id(), outcome.artifacts.run_id());

    let a = first.predict(&scenario_record()).unwrap();
    let b = second.predict(&scenario_record()).unwrap();

    assert!(a.label.as_u8() <= 1);
    assert!((0.0..=1.0).contains(&a.probability));
    assert!(!a.feature_mismatch);
    assert_eq!(a.probability.to_bits(), b.probability.to_bits());
    assert_eq!(a.label, b.label);
}

#[test]
fn loaded_service_matches_in_memory_model() {
    let dir = TempDir::new().unwrap();
    let (paths, outcome) = train_into(dir.path());

    let loaded = InferenceService::load(&paths, 0.5, false).unwrap();
    let in_memory = InferenceService::new(outcome.artifacts, 0.5, false);

    let record = scenario_record();
    assert_eq!(
        loaded.predict(&record).unwrap(),
        in_memory.predict(&record).unwrap()
    );
}

#[test]
fn batch_and_single_predictions_agree() {
    let dir = TempDir::new().unwrap();
    let (paths, _) = train_into(dir.path());
    let service = InferenceService::load(&paths, 0.5, false).unwrap();

    let records = vec![
        scenario_record(),
        scenario_record()
            .with("Contract", "Two year")
            .with("tenure", 60u32)
            .with("TotalCharges", "5730.00"),
        scenario_record().with("TotalCharges", " ").with("tenure", 0u32),
    ];
    let batch = service.predict_batch(&records).unwrap();
    for (record, expected) in records.iter().zip(&batch) {
        assert_eq!(&service.predict(record).unwrap(), expected);
    }
}

#[test]
fn missing_artifact_is_reported() {
    let dir = TempDir::new().unwrap();
    let (paths, _) = train_into(dir.path());
    std::fs::remove_file(&paths.encoder).unwrap();

    match InferenceService::load(&paths, 0.5, false) {
        Err(ChurnError::ArtifactNotFound { kind, .. }) => assert_eq!(kind, ArtifactKind::Encoder),
        other => panic!("expected ArtifactNotFound, got {other:?}"),
    }
}

#[test]
fn artifacts_from_different_runs_are_rejected() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let (first_paths, _) = train_into(first.path());
    let (second_paths, _) = train_into(second.path());

    let mixed = ArtifactPaths {
        path: first_paths.path.clone(),
        columns: second_paths.columns.clone(),
        encoder: first_paths.encoder.clone(),
    };
    assert!(matches!(
        InferenceService::load(&mixed, 0.5, false),
        Err(ChurnError::ArtifactMismatch(_))
    ));
}

#[test]
fn tampered_artifact_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (paths, _) = train_into(dir.path());

    let text = std::fs::read_to_string(&paths.path).unwrap();
    assert!(text.contains("\"feature_count\":"));
    // Any byte change inside the payload invalidates the checksum
    let tampered = text.replacen("\"feature_count\":", "\"feature_count\": ", 1);
    std::fs::write(&paths.path, tampered).unwrap();

    assert!(matches!(
        InferenceService::load(&paths, 0.5, false),
        Err(ChurnError::InvalidArtifact {
            kind: ArtifactKind::Model,
            ..
        })
    ));
}

#[test]
fn unknown_category_still_predicts() {
    let dir = TempDir::new().unwrap();
    let (paths, _) = train_into(dir.path());
    let service = InferenceService::load(&paths, 0.5, false).unwrap();

    let prediction = service
        .predict(&scenario_record().with("PaymentMethod", "Cryptocurrency"))
        .unwrap();
    assert!((0.0..=1.0).contains(&prediction.probability));
}

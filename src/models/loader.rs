//! Artifact set loader
//!
//! The model, encoder and column list of one training run are always
//! loaded, checked and used together.

use crate::errors::{ArtifactKind, ChurnError, Result};
use crate::features::{FeatureEncoder, TrainingColumns};
use crate::models::artifacts::{self, RunInfo};
use crate::models::gbdt::BoostedTrees;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// File locations of the three training artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Serialized classifier
    pub path: PathBuf,
    /// Ordered training column list
    pub columns: PathBuf,
    /// Fitted feature encoder
    pub encoder: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside one directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            path: dir.join("xgb_churn_model.json"),
            columns: dir.join("training_columns.json"),
            encoder: dir.join("feature_encoder.json"),
        }
    }
}

/// Model, encoder and column list from a single training run
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub run: RunInfo,
    pub model: BoostedTrees,
    pub encoder: FeatureEncoder,
    pub columns: TrainingColumns,
}

impl ArtifactSet {
    /// Bundle freshly trained artifacts, checking they fit together
    pub fn new(
        run: RunInfo,
        model: BoostedTrees,
        encoder: FeatureEncoder,
        columns: TrainingColumns,
    ) -> Result<Self> {
        let set = Self {
            run,
            model,
            encoder,
            columns,
        };
        set.check_consistency()?;
        Ok(set)
    }

    pub fn run_id(&self) -> Uuid {
        self.run.run_id
    }

    /// Load and verify all three artifacts
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        info!(
            model = %paths.path.display(),
            encoder = %paths.encoder.display(),
            columns = %paths.columns.display(),
            "Loading artifacts"
        );

        let model = artifacts::load::<BoostedTrees>(&paths.path, ArtifactKind::Model)?;
        let encoder = artifacts::load::<FeatureEncoder>(&paths.encoder, ArtifactKind::Encoder)?;
        let columns = artifacts::load::<TrainingColumns>(&paths.columns, ArtifactKind::Columns)?;

        for (kind, run_id) in [
            (ArtifactKind::Encoder, encoder.run.run_id),
            (ArtifactKind::Columns, columns.run.run_id),
        ] {
            if run_id != model.run.run_id {
                return Err(ChurnError::ArtifactMismatch(format!(
                    "{kind} artifact comes from run {run_id}, model from run {}",
                    model.run.run_id
                )));
            }
        }

        let set = Self::new(model.run, model.payload, encoder.payload, columns.payload)?;
        info!(
            run_id = %set.run.run_id,
            trained_at = %set.run.created_at,
            trees = set.model.trees.len(),
            features = set.columns.len(),
            "Artifacts loaded"
        );
        Ok(set)
    }

    /// Write all three artifacts under this set's run identity
    pub fn save(&self, paths: &ArtifactPaths) -> Result<()> {
        artifacts::save(&paths.path, ArtifactKind::Model, &self.run, &self.model)?;
        artifacts::save(&paths.encoder, ArtifactKind::Encoder, &self.run, &self.encoder)?;
        artifacts::save(&paths.columns, ArtifactKind::Columns, &self.run, &self.columns)?;

        info!(
            run_id = %self.run.run_id,
            model = %paths.path.display(),
            "Artifacts saved"
        );
        Ok(())
    }

    fn check_consistency(&self) -> Result<()> {
        self.model.validate()?;
        if !self.encoder.is_fitted() {
            return Err(ChurnError::EncoderNotFitted);
        }
        if self.model.feature_count != self.columns.len() {
            return Err(ChurnError::ArtifactMismatch(format!(
                "model expects {} features but the column list has {}",
                self.model.feature_count,
                self.columns.len()
            )));
        }

        let diff = self.columns.diff(&self.encoder.output_columns()?);
        if !diff.is_empty() {
            warn!(
                missing = ?diff.missing,
                extra = ?diff.extra,
                "Encoder output differs from training columns"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::tests::fitted_encoder;
    use crate::models::gbdt::{BoosterParams, Node, Tree};
    use tempfile::TempDir;

    pub(crate) fn tiny_set() -> ArtifactSet {
        let encoder = fitted_encoder();
        let columns = TrainingColumns::new(encoder.output_columns().unwrap());
        let tenure = columns.columns().iter().position(|c| c == "tenure").unwrap();
        let model = BoostedTrees::new(
            0.0,
            columns.len(),
            BoosterParams::default(),
            vec![Tree::new(vec![
                Node::split(tenure, 0.0, 1, 2),
                Node::leaf(1.5),
                Node::leaf(-1.5),
            ])],
        );
        ArtifactSet::new(RunInfo::new(), model, encoder, columns).unwrap()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let set = tiny_set();

        set.save(&paths).unwrap();
        let loaded = ArtifactSet::load(&paths).unwrap();

        assert_eq!(loaded.run_id(), set.run_id());
        assert_eq!(loaded.model, set.model);
        assert_eq!(loaded.encoder, set.encoder);
        assert_eq!(loaded.columns, set.columns);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        tiny_set().save(&paths).unwrap();
        std::fs::remove_file(&paths.encoder).unwrap();

        assert!(matches!(
            ArtifactSet::load(&paths),
            Err(ChurnError::ArtifactNotFound { kind: ArtifactKind::Encoder, .. })
        ));
    }

    #[test]
    fn test_mixed_runs_rejected() {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let first = tiny_set();
        first.save(&paths).unwrap();

        let other = RunInfo::new();
        artifacts::save(&paths.columns, ArtifactKind::Columns, &other, &first.columns).unwrap();

        assert!(matches!(
            ArtifactSet::load(&paths),
            Err(ChurnError::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_unfitted_encoder_rejected() {
        let set = tiny_set();
        let err = ArtifactSet::new(
            set.run,
            set.model,
            FeatureEncoder::unfitted(),
            set.columns,
        )
        .unwrap_err();
        assert!(matches!(err, ChurnError::EncoderNotFitted));
    }

    #[test]
    fn test_malformed_trees_rejected() {
        let set = tiny_set();
        let feature_count = set.model.feature_count;

        for nodes in [
            vec![Node::split(feature_count, 0.0, 1, 2), Node::leaf(1.0), Node::leaf(-1.0)],
            vec![Node::split(0, 0.0, 0, 0)],
            vec![Node::split(0, 0.0, 1, 5), Node::leaf(1.0)],
        ] {
            let mut model = set.model.clone();
            model.trees = vec![Tree::new(nodes)];
            assert!(matches!(
                ArtifactSet::new(set.run, model, set.encoder.clone(), set.columns.clone()),
                Err(ChurnError::InvalidArtifact { kind: ArtifactKind::Model, .. })
            ));
        }
    }

    #[test]
    fn test_feature_count_mismatch() {
        let set = tiny_set();
        let mut model = set.model.clone();
        model.feature_count += 1;
        assert!(matches!(
            ArtifactSet::new(set.run, model, set.encoder, set.columns),
            Err(ChurnError::ArtifactMismatch(_))
        ));
    }
}

//! Churn classifier, artifact storage and inference

pub mod artifacts;
pub mod gbdt;
pub mod inference;
pub mod loader;

pub use artifacts::RunInfo;
pub use gbdt::{BoostedTrees, BoosterParams};
pub use inference::InferenceService;
pub use loader::{ArtifactPaths, ArtifactSet};

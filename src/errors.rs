//! Error types for the churn prediction pipeline

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the three frozen training artifacts an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Model,
    Encoder,
    Columns,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::Encoder => write!(f, "encoder"),
            ArtifactKind::Columns => write!(f, "columns"),
        }
    }
}

/// A raw record does not match the schema registry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("field `{field}` has unrecognized value {value:?} (expected one of {expected:?})")]
    UnknownValue {
        field: String,
        value: String,
        expected: Vec<String>,
    },

    #[error("field `{field}` must be {expected}, got {value:?}")]
    Mistyped {
        field: String,
        expected: &'static str,
        value: String,
    },
}

/// Errors that can occur while encoding, training, loading or predicting
#[derive(Debug, Error)]
pub enum ChurnError {
    /// Input record missing, mistyped or out of domain
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Categorical encoder or scaler used before training fitted it
    #[error("feature encoder used before it was fitted")]
    EncoderNotFitted,

    /// Artifact file missing at load time
    #[error("{kind} artifact not found at {}", path.display())]
    ArtifactNotFound { kind: ArtifactKind, path: PathBuf },

    /// Artifacts from different training runs, or otherwise inconsistent
    #[error("artifact mismatch: {0}")]
    ArtifactMismatch(String),

    /// Artifact envelope could not be trusted
    #[error("invalid {kind} artifact: {reason}")]
    InvalidArtifact { kind: ArtifactKind, reason: String },

    /// Aligned feature batch is entirely zero
    #[error("feature mismatch: aligned feature vector is all zeros")]
    FeatureMismatch,

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ChurnError {
    /// Whether the error only fails the request that caused it.
    ///
    /// Everything else indicates broken deployment or configuration.
    pub fn is_request_scoped(&self) -> bool {
        matches!(self, ChurnError::Schema(_) | ChurnError::FeatureMismatch)
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, ChurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_scope() {
        let schema = ChurnError::from(SchemaError::MissingField("tenure".to_string()));
        assert!(schema.is_request_scoped());
        assert!(ChurnError::FeatureMismatch.is_request_scoped());
        assert!(!ChurnError::EncoderNotFitted.is_request_scoped());
        assert!(!ChurnError::ArtifactMismatch("run ids differ".to_string()).is_request_scoped());
    }

    #[test]
    fn test_error_messages() {
        let err = ChurnError::ArtifactNotFound {
            kind: ArtifactKind::Columns,
            path: PathBuf::from("models/training_columns.json"),
        };
        assert_eq!(
            err.to_string(),
            "columns artifact not found at models/training_columns.json"
        );

        let err = SchemaError::Mistyped {
            field: "tenure".to_string(),
            expected: "a non-negative integer",
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "field `tenure` must be a non-negative integer, got \"abc\""
        );
    }
}

//! Customer Churn Prediction Pipeline Library
//!
//! Turns raw telecom customer records into churn predictions: schema
//! validation, feature encoding with a frozen scaler, alignment to the
//! training column list and boosted-tree classification. The offline side
//! trains the model and writes the three artifacts the service loads.

pub mod config;
pub mod errors;
pub mod features;
pub mod metrics;
pub mod models;
pub mod schema;
pub mod server;
pub mod training;
pub mod types;

pub use config::AppConfig;
pub use errors::{ChurnError, Result, SchemaError};
pub use features::{FeatureEncoder, TrainingColumns};
pub use models::{ArtifactPaths, ArtifactSet, InferenceService};
pub use training::{TrainingOrchestrator, TrainingOutcome};
pub use types::{ChurnLabel, ChurnPrediction, RawRecord};

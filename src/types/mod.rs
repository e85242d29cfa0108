//! Type definitions for the churn prediction pipeline

pub mod prediction;
pub mod record;

pub use prediction::{ChurnLabel, ChurnPrediction, PredictionResponse};
pub use record::{FieldValue, RawRecord};

//! Offline training: dataset ingestion, hyper-parameter search and the
//! boosted-tree trainer that produces the inference artifacts

pub mod booster;
pub mod cart;
pub mod dataset;
pub mod orchestrator;
pub mod scoring;
pub mod search;
pub mod synthetic;

pub use booster::GbdtTrainer;
pub use dataset::{Dataset, DatasetOverview};
pub use orchestrator::{TrainingOrchestrator, TrainingOutcome};
pub use scoring::{ClassificationReport, Scoring};
pub use search::{ParamSpace, RandomizedSearch, StratifiedKFold};

//! Configuration management for the churn prediction pipeline

use crate::models::ArtifactPaths;
use crate::training::{ParamSpace, Scoring};
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Default configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Prefix for environment overrides, e.g. `CHURN__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "CHURN";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Raw dataset location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file with one customer per row
    pub raw_path: PathBuf,
    /// Label column
    pub target_column: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("data/raw/telco_customer_churn.csv"),
            target_column: crate::schema::TARGET_FIELD.to_string(),
        }
    }
}

/// Artifact locations
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Serialized classifier
    pub path: PathBuf,
    /// Ordered training column list
    pub columns: PathBuf,
    /// Fitted feature encoder
    pub encoder: PathBuf,
}

impl ModelConfig {
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            path: self.path.clone(),
            columns: self.columns.clone(),
            encoder: self.encoder.clone(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let paths = ArtifactPaths::in_dir("models");
        Self {
            path: paths.path,
            columns: paths.columns,
            encoder: paths.encoder,
        }
    }
}

/// Prediction behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Churn probability above which a customer is labelled as churning
    pub threshold: f64,
    /// Reject requests whose aligned features are all zero
    pub strict_feature_check: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            strict_feature_check: false,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Interval of the periodic metrics summary log
    pub metrics_interval_secs: u64,
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            metrics_interval_secs: 60,
        }
    }
}

/// Offline training configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    pub cv_folds: usize,
    /// Maximum number of sampled hyper-parameter candidates
    pub n_iter: usize,
    pub scoring: Scoring,
    pub seed: u64,
    pub param_space: ParamSpace,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            cv_folds: 3,
            n_iter: 10,
            scoring: Scoring::F1,
            seed: 42,
            param_space: ParamSpace::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// `RUST_LOG` when it parses, otherwise the configured level
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_from_default_env().or_else(|_| self.level_filter())
    }

    /// Filter built from `level` alone
    pub fn level_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.level)
            .with_context(|| format!("Invalid logging.level `{}`", self.level))
    }
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path, with environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.inference.threshold) {
            bail!(
                "inference.threshold must be within [0, 1], got {}",
                self.inference.threshold
            );
        }
        let training = &self.training;
        if !(training.test_size > 0.0 && training.test_size < 1.0) {
            bail!("training.test_size must be within (0, 1), got {}", training.test_size);
        }
        if training.cv_folds < 2 {
            bail!("training.cv_folds must be at least 2, got {}", training.cv_folds);
        }
        if training.n_iter == 0 {
            bail!("training.n_iter must be at least 1");
        }
        training
            .param_space
            .validate()
            .context("Invalid training.param_space")?;
        Ok(())
    }
}

//! Churn Prediction Pipeline - Main Entry Point
//!
//! Inspects the raw dataset, trains the model, predicts from the command line
//! and serves the prediction API and form page.

use anyhow::{Context, Result};
use churn_prediction_pipeline::{
    config::{AppConfig, LogFormat, LoggingConfig, DEFAULT_CONFIG_PATH},
    metrics::{MetricsReporter, PredictionMetrics},
    server::{self, AppState},
    training::{DatasetOverview, TrainingOrchestrator},
    types::RawRecord,
    InferenceService,
};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "churn-pipeline", version, about = "Customer churn prediction pipeline")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print shape, column types and missing values of the raw dataset
    Overview,
    /// Train the model and write the artifact set
    Train {
        /// Number of sampled hyper-parameter candidates
        #[arg(long)]
        n_iter: Option<usize>,
        /// Seed for splitting, search and boosting
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Predict churn for a JSON record or array of records
    Predict {
        /// Input file (reads stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Serve the prediction API and form page
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from_path(&cli.config)?;
    init_logging(&config.logging)?;
    info!(config = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Command::Overview => overview(&config),
        Command::Train { n_iter, seed } => {
            if let Some(n_iter) = n_iter {
                config.training.n_iter = n_iter;
            }
            if let Some(seed) = seed {
                config.training.seed = seed;
            }
            config.validate()?;
            train(&config)
        }
        Command::Predict { input } => predict(&config, input),
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(logging.env_filter()?);
    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn overview(config: &AppConfig) -> Result<()> {
    let overview = DatasetOverview::from_csv(&config.data.raw_path)?;
    println!("{overview}");
    Ok(())
}

fn train(config: &AppConfig) -> Result<()> {
    info!(
        data = %config.data.raw_path.display(),
        n_iter = config.training.n_iter,
        cv_folds = config.training.cv_folds,
        scoring = %config.training.scoring,
        seed = config.training.seed,
        "Starting training run"
    );

    let outcome = TrainingOrchestrator::from_config(config)
        .run(config)
        .context("Training failed")?;

    println!("Best parameters: {:?}", outcome.search.best_params);
    println!(
        "Best CV {}: {:.4}",
        config.training.scoring, outcome.search.best_score
    );
    println!("\n=== Held-out evaluation ({} rows) ===", outcome.test_rows);
    println!("{}", outcome.report);
    println!("Artifacts written for run {}", outcome.artifacts.run_id());
    Ok(())
}

fn predict(config: &AppConfig, input: Option<PathBuf>) -> Result<()> {
    let raw = match &input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    let value: serde_json::Value = serde_json::from_str(&raw).context("Input is not valid JSON")?;
    let records: Vec<RawRecord> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value),
        _ => serde_json::from_value(value).map(|record| vec![record]),
    }
    .context("Input must be a JSON object or an array of objects")?;

    let service = InferenceService::from_config(config)?;
    let predictions = service.predict_batch(&records)?;
    for prediction in &predictions {
        println!(
            "{}\t{:.4}\t{}",
            prediction.label.as_u8(),
            prediction.probability,
            prediction.label
        );
    }
    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    let service = Arc::new(InferenceService::from_config(&config)?);
    info!(
        features = service.feature_count(),
        threshold = service.threshold(),
        "Inference service ready"
    );

    let metrics = Arc::new(PredictionMetrics::new());
    let reporter = MetricsReporter::new(metrics.clone(), config.server.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let state = AppState::new(service, metrics.clone());
    server::serve(&config.server.addr(), state).await?;

    info!("Server shutting down...");
    metrics.print_summary();
    Ok(())
}
